//! Tool paths taken from the process environment
//!
//! Kept in its own test binary: it changes process-wide environment
//! variables.
#![cfg(unix)]

use pmosverigesradio::stations::find_station;
use pmosverigesradio::{SverigesRadioClient, SverigesRadioSource, UriDetails, UriProvider};
use std::os::unix::fs::PermissionsExt;
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn test_client_backed_source_uses_ffmpeg_path() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = dir.path().join("custom-ffmpeg");
    std::fs::write(&ffmpeg, "#!/bin/sh\nprintf 'RIFF'\nexec sleep 30\n").unwrap();
    std::fs::set_permissions(&ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();

    std::env::set_var("FFMPEG_PATH", &ffmpeg);

    let client = SverigesRadioClient::new().await.unwrap();
    let source = SverigesRadioSource::from_client(client).unwrap();

    let station = find_station("sverigesradio:p1").unwrap().details();
    let mut stream = source.get_stream(&UriDetails::Radio(station)).await.unwrap();

    let mut riff = [0u8; 4];
    stream.read_exact(&mut riff).await.unwrap();
    assert_eq!(&riff, b"RIFF");
    assert!(stream.stop().await.is_clean());
}

//! Transcoder and probe subprocess tests, using shell scripts in place of
//! ffmpeg/ffprobe
#![cfg(unix)]

use pmosverigesradio::stations::find_station;
use pmosverigesradio::{
    CdnTrack, Error, ErrorCode, FfprobeProber, Prober, StreamLauncher, SverigesRadioClient,
    SverigesRadioSource, Termination, TrackId, UriDetails, UriProvider,
};
use serde_json::json;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STATION_URL: &str = "https://live-cdn.sr.se/pool2/p1/p1.isml/p1-audio=192000.m3u8";

const SCRIPTS: &[(&str, &str)] = &[
    // Emits a WAV header then keeps "streaming"
    (
        "ffmpeg_live",
        "#!/bin/sh\necho \"input: $2\" >&2\nprintf 'RIFF\\000\\000\\000\\000WAVE'\nexec sleep 30\n",
    ),
    // Echoes its arguments, one per line, then exits
    ("ffmpeg_args", "#!/bin/sh\nprintf '%s\\n' \"$@\"\n"),
    // Fails like ffmpeg on a dead URL
    (
        "ffmpeg_dead",
        "#!/bin/sh\necho 'Server returned 404 Not Found' >&2\nexit 1\n",
    ),
    // Never produces output
    ("ffmpeg_silent", "#!/bin/sh\nexec sleep 30\n"),
    (
        "ffprobe_ok",
        "#!/bin/sh\ncat <<'EOF'\n{\"streams\":[{\"codec_type\":\"audio\",\"codec_name\":\"aac\",\"sample_rate\":\"48000\",\"channels\":2}],\"format\":{\"format_name\":\"hls\",\"bit_rate\":\"192000\"}}\nEOF\n",
    ),
    ("ffprobe_fail", "#!/bin/sh\necho 'Invalid data' >&2\nexit 1\n"),
];

/// All scripts are written once, before anything is spawned, so no test can
/// fork while another still holds a script open for writing.
fn script(name: &str) -> PathBuf {
    static DIR: OnceLock<TempDir> = OnceLock::new();

    let dir = DIR.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in SCRIPTS {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        dir
    });

    dir.path().join(name)
}

fn launcher(name: &str) -> StreamLauncher {
    StreamLauncher::new(script(name))
        .with_startup_timeout(Duration::from_millis(1500))
        .with_kill_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn test_stream_replays_startup_bytes() {
    let mut stream = launcher("ffmpeg_live")
        .launch("sverigesradio:p1", STATION_URL)
        .await
        .unwrap();

    assert_eq!(stream.uri(), "sverigesradio:p1");
    assert!(stream.pid().is_some());

    let mut header = [0u8; 12];
    stream.read_exact(&mut header).await.unwrap();
    assert_eq!(&header[..4], b"RIFF");
    assert_eq!(&header[8..], b"WAVE");

    assert_eq!(stream.stop().await, Termination::Killed);
    assert!(stream.pid().is_none());
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let mut stream = launcher("ffmpeg_live")
        .launch("sverigesradio:p2", STATION_URL)
        .await
        .unwrap();

    assert_eq!(stream.stop().await, Termination::Killed);
    assert_eq!(stream.stop().await, Termination::AlreadyExited);
    assert_eq!(stream.stop().await, Termination::AlreadyExited);
}

#[tokio::test]
async fn test_stop_after_natural_exit() {
    let mut stream = launcher("ffmpeg_args")
        .launch("sverigesradio:42", "https://cdn.example/clip.m4a")
        .await
        .unwrap();

    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();
    assert_eq!(
        out.lines().collect::<Vec<_>>(),
        ["-i", "https://cdn.example/clip.m4a", "-vn", "-acodec", "copy", "-f", "wav", "-"]
    );

    // stdout is closed; the process is gone or about to be
    assert!(stream.stop().await.is_clean());
    assert_eq!(stream.stop().await, Termination::AlreadyExited);
}

#[tokio::test]
async fn test_early_exit_is_a_start_failure() {
    let err = launcher("ffmpeg_dead")
        .launch("sverigesradio:p3", STATION_URL)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::Process);
    assert!(err
        .to_string()
        .starts_with("Failed to play Sveriges Radio (sverigesradio:p3)"));

    match err {
        Error::StreamStart { termination, .. } => {
            assert!(termination.is_clean(), "{termination:?}")
        }
        other => panic!("expected a start failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_silent_transcoder_is_killed() {
    let launcher = StreamLauncher::new(script("ffmpeg_silent"))
        .with_startup_timeout(Duration::from_millis(300));

    let started = Instant::now();
    let err = launcher
        .launch("sverigesradio:p4", STATION_URL)
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    match err {
        Error::StreamStart {
            termination,
            source,
            ..
        } => {
            assert_eq!(termination, Termination::Killed);
            assert!(matches!(*source, Error::Timeout(_)));
        }
        other => panic!("expected a start failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_source_streams_a_station() {
    let client = SverigesRadioClient::new().await.unwrap();
    let source = SverigesRadioSource::from_client(client)
        .unwrap()
        .with_launcher(launcher("ffmpeg_live"));

    let station = find_station("sverigesradio:p1").unwrap().details();
    let mut stream = source.get_stream(&UriDetails::Radio(station)).await.unwrap();

    let mut riff = [0u8; 4];
    stream.read_exact(&mut riff).await.unwrap();
    assert_eq!(&riff, b"RIFF");
    assert!(stream.stop().await.is_clean());
}

#[tokio::test]
async fn test_source_reports_failed_start() {
    let client = SverigesRadioClient::new().await.unwrap();
    let source = SverigesRadioSource::from_client(client)
        .unwrap()
        .with_launcher(launcher("ffmpeg_dead"));

    let station = find_station("sverigesradio:p2").unwrap().details();
    let err = source
        .get_stream(&UriDetails::Radio(station))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Process);
}

#[tokio::test]
async fn test_ffprobe_output_is_parsed() {
    let prober = FfprobeProber::new(script("ffprobe_ok"));
    let info = prober.probe(STATION_URL).await.unwrap();

    assert_eq!(info.duration, None);
    assert_eq!(info.format.format_name.as_deref(), Some("hls"));
    assert_eq!(info.format.codec.as_deref(), Some("aac"));
    assert_eq!(info.format.sample_rate, Some(48000));
    assert_eq!(info.format.channels, Some(2));
    assert_eq!(info.format.bit_rate, Some(192000));
}

#[tokio::test]
async fn test_ffprobe_failure() {
    let prober = FfprobeProber::new(script("ffprobe_fail"));
    let err = prober.probe(STATION_URL).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::Upstream);
    assert!(err.to_string().contains("Invalid data"));
}

#[tokio::test]
async fn test_ffprobe_timeout() {
    let prober =
        FfprobeProber::new(script("ffmpeg_silent")).with_timeout(Duration::from_millis(200));
    let err = prober.probe(STATION_URL).await.unwrap_err();
    assert!(err.to_string().contains("timed out"));
}

/// Collects formatted log output
#[derive(Clone, Default)]
struct LogBuffer(Arc<StdMutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_failed_start_logs_transcoder_stderr() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let err = launcher("ffmpeg_dead")
        .launch("sverigesradio:p3", STATION_URL)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Process);

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("Transcoder output"), "{output}");
    assert!(output.contains("Server returned 404"), "{output}");
    assert!(output.contains("Failed to start transcoder"), "{output}");
}

#[tokio::test]
async fn test_stream_starts_before_slow_revalidation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playerajax/getaudiourl"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"audioUrl": "https://cdn.example/x.m4a", "duration": 60}))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let client = SverigesRadioClient::builder()
        .cdn_url(format!("{}/playerajax/getaudiourl", server.uri()))
        .build()
        .await
        .unwrap();
    let source = SverigesRadioSource::from_client(client)
        .unwrap()
        .with_launcher(launcher("ffmpeg_live"));

    // Not in this source's cache: re-validation has to ask the CDN
    let mut track = CdnTrack::new(TrackId::new(777).unwrap());
    track.contents = Some("https://cdn.example/x.m4a".into());

    let started = Instant::now();
    let mut stream = source.get_stream(&UriDetails::Track(track)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    let mut riff = [0u8; 4];
    stream.read_exact(&mut riff).await.unwrap();
    assert_eq!(&riff, b"RIFF");
    assert!(stream.stop().await.is_clean());
}

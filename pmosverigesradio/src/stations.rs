//! The four live Sveriges Radio stations and the root folder

use crate::models::{AudioFormat, RootFolder, StationDetails, DIGILISTAN_URI, ROOT_URI};

/// Title of the root folder
pub const ROOT_TITLE: &str = "Sveriges Radio";

/// A live station (static, never mutated)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationEntry {
    pub uri: &'static str,
    pub title: &'static str,
    /// HLS manifest of the live stream
    pub stream_url: &'static str,
}

/// Known stations, in root folder order
pub const STATIONS: [StationEntry; 4] = [
    StationEntry {
        uri: "sverigesradio:p1",
        title: "Sveriges Radio P1",
        stream_url: "https://live-cdn.sr.se/pool2/p1/p1.isml/p1-audio=192000.m3u8",
    },
    StationEntry {
        uri: "sverigesradio:p2",
        title: "Sveriges Radio P2",
        stream_url: "https://live-cdn.sr.se/pool2/p2/p2.isml/p2-audio=192000.m3u8",
    },
    StationEntry {
        uri: "sverigesradio:p3",
        title: "Sveriges Radio P3",
        stream_url: "https://live-cdn.sr.se/pool1/p3/p3.isml/p3-audio=192000.m3u8",
    },
    StationEntry {
        uri: "sverigesradio:p4",
        title: "Sveriges Radio P4",
        stream_url:
            "https://live-cdn.sr.se/pool3/p4stockholm/p4stockholm.isml/p4stockholm-audio=48000.m3u8",
    },
];

impl StationEntry {
    /// Unprobed descriptor for this station
    pub fn details(&self) -> StationDetails {
        StationDetails {
            uri: self.uri.to_string(),
            title: self.title.to_string(),
            contents: self.stream_url.to_string(),
            duration: None,
            format: AudioFormat::default(),
        }
    }
}

/// Look up a station by uri
pub fn find_station(uri: &str) -> Option<&'static StationEntry> {
    STATIONS.iter().find(|s| s.uri == uri)
}

/// The fixed `sverigesradio:/` folder: every station, then Digilistan
pub fn root_folder() -> RootFolder {
    let mut contents: Vec<String> = STATIONS.iter().map(|s| s.uri.to_string()).collect();
    contents.push(DIGILISTAN_URI.to_string());

    RootFolder {
        uri: ROOT_URI.to_string(),
        title: ROOT_TITLE.to_string(),
        contents,
    }
}

/// Root, a station or Digilistan: answerable without any I/O
pub fn is_static_uri(uri: &str) -> bool {
    uri == ROOT_URI || uri == DIGILISTAN_URI || find_station(uri).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_folder_contents() {
        let root = root_folder();
        assert_eq!(root.uri, "sverigesradio:/");
        assert_eq!(root.title, "Sveriges Radio");
        assert_eq!(
            root.contents,
            vec![
                "sverigesradio:p1",
                "sverigesradio:p2",
                "sverigesradio:p3",
                "sverigesradio:p4",
                "sverigesradio:digilistan",
            ]
        );
    }

    #[test]
    fn test_station_titles_follow_uri() {
        for station in &STATIONS {
            let suffix = station.uri.split(':').nth(1).unwrap().to_uppercase();
            assert_eq!(station.title, format!("Sveriges Radio {}", suffix));
        }
    }

    #[test]
    fn test_static_uris() {
        assert!(is_static_uri("sverigesradio:/"));
        assert!(is_static_uri("sverigesradio:p3"));
        assert!(is_static_uri("sverigesradio:digilistan"));
        assert!(!is_static_uri("sverigesradio:p5"));
        assert!(!is_static_uri("sverigesradio:7273377"));

        let p4 = find_station("sverigesradio:p4").unwrap().details();
        assert!(p4.contents.contains("p4stockholm"));
    }
}

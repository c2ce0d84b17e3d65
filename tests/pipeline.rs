//! End-to-end pipeline through the public API
//!
//! Discovery intake, a download batch against a mock archive, then the
//! transcription hand-off:
//! - scraped candidates become `discovered` records
//! - a batch downloads what the archive serves and fails the rest
//! - downloaded records are handed to the transcription step and never
//!   reselected for download

use chrono::NaiveDate;
use session_ingest::{
    Config, Downloader, NewRecord, RecordStatus, ResolverConfig, Result, ScraperSource,
};
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct ArchiveListing {
    source: &'static str,
    entries: Vec<(&'static str, &'static str, String)>,
}

#[async_trait::async_trait]
impl ScraperSource for ArchiveListing {
    fn source(&self) -> &str {
        self.source
    }

    async fn discover(&self, _since: NaiveDate) -> Result<Vec<NewRecord>> {
        Ok(self
            .entries
            .iter()
            .map(|(id, date, url)| NewRecord {
                source: self.source.to_string(),
                external_id: id.to_string(),
                title: Some(format!("Committee hearing {}", id)),
                publish_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                origin_url: url.clone(),
            })
            .collect())
    }
}

fn part_files(root: &Path) -> usize {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn discovered_records_flow_through_download_to_transcription() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ArchiveVideoFiles/HAGRI-010924.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![42u8; 64 * 1024]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ArchiveVideoFiles/HEDU-011024.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1024]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/senate/video/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("sessions.db");
    config.download.data_dir = temp_dir.path().join("data");
    config.sources.resolvers.insert(
        "house".to_string(),
        ResolverConfig::HouseArchive {
            base_url: server.uri(),
        },
    );
    let downloader = Downloader::new(config).await.unwrap();

    let page = |id: &str| format!("https://house.mi.gov/VideoArchivePlayer?video={}.mp4", id);
    let scrapers: Vec<Arc<dyn ScraperSource>> = vec![
        Arc::new(ArchiveListing {
            source: "house",
            entries: vec![
                ("HAGRI-010924", "2024-01-09", page("HAGRI-010924")),
                ("HEDU-011024", "2024-01-10", page("HEDU-011024")),
            ],
        }),
        Arc::new(ArchiveListing {
            source: "senate",
            entries: vec![(
                "missing",
                "2024-01-08",
                format!("{}/senate/video/missing", server.uri()),
            )],
        }),
    ];

    let since = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let intake = downloader.ingest_since(&scrapers, since).await.unwrap();
    assert_eq!(intake.inserted, 3);
    assert!(intake.failed_sources.is_empty());

    let summary = downloader.run_next_batch().await.unwrap();
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(part_files(temp_dir.path()), 0);

    // Newest first
    let ready = downloader.database().select_downloaded(10).await.unwrap();
    let ids: Vec<_> = ready.iter().map(|r| r.key.external_id.as_str()).collect();
    assert_eq!(ids, vec!["HEDU-011024", "HAGRI-010924"]);

    let media = ready[1].download_path.clone().unwrap();
    assert_eq!(std::fs::metadata(&media).unwrap().len(), 64 * 1024);
    assert_eq!(media, downloader.layout().media_path(&ready[1].key));

    // Transcription hand-off
    let transcript = downloader.layout().transcript_path(&ready[1].key);
    std::fs::write(&transcript, "1\n00:00:00,000 --> 00:00:01,000\nCall to order\n").unwrap();
    assert!(
        downloader
            .database()
            .mark_transcribed(&ready[1].key, &transcript)
            .await
            .unwrap()
    );

    // Only the failed senate record is still eligible
    let eligible = downloader.select_batch(10).await.unwrap();
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].key.source, "senate");
    assert_eq!(eligible[0].status, RecordStatus::Failed);
    assert!(eligible[0].error.as_deref().unwrap().contains("404"));

    // Re-running intake creates nothing new and leaves progress untouched
    let again = downloader.ingest_since(&scrapers, since).await.unwrap();
    assert_eq!(again.inserted, 0);
    let transcribed = downloader
        .database()
        .get_record(&ready[1].key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transcribed.status, RecordStatus::Transcribed);
    assert_eq!(transcribed.transcript_path.as_deref(), Some(transcript.as_path()));
}

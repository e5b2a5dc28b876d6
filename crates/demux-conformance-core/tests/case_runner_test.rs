//! End-to-end case execution against the mock browser and demuxer

use demux_conformance_core::normalize::MismatchKind;
use demux_conformance_core::{
    build_matrix, CaseFailure, CaseOutcome, CaseRunner, CaseState, DemuxerOp, DriverConfig,
    DriverFailure, FixtureError, HarnessConfig, PacketViolation, SampleFile, Scenario,
    SessionDriver, StreamKind,
};
use demux_conformance_test_utils::fixtures::{
    clip_media_info, rotated_90_orientation, rotated_media_info, TestCorpus, MP4_SAMPLE_BYTES,
    WEBM_SAMPLE_BYTES,
};
use demux_conformance_test_utils::mocks::{
    FailurePlan, MockBrowser, MockDemuxer, MockPacket, PageEventKind,
};
use demux_conformance_test_utils::{case_for, expect_failure, within};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn valid_packets(demuxer: MockDemuxer, name: &str) -> MockDemuxer {
    demuxer
        .with_packet(name, StreamKind::Video, MockPacket::new(vec![0, 0, 0, 1, 0x65], 4.0, 0.04))
        .with_packet(
            name,
            StreamKind::Audio,
            MockPacket::new(vec![0xff, 0xf1, 0x50], 4.011, 0.021).with_backing_byte_length(4096),
        )
}

#[tokio::test]
async fn test_clip_with_matching_fixture_passes() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    corpus.add_media_info_fixture("clip.mp4", &clip_media_info()).unwrap();

    let browser =
        MockBrowser::new(MockDemuxer::new().with_media_info("clip.mp4", clip_media_info()));
    let runner = CaseRunner::new(browser.clone(), &corpus.config());

    let outcome = runner.execute(&case_for(Scenario::MediaInfo, path)).await;
    assert_eq!(outcome, CaseOutcome::Passed);
    assert_eq!(browser.pages_opened(), 1);
    assert_eq!(browser.open_pages(), 0);
}

#[tokio::test]
async fn test_differing_extradata_reports_path() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    corpus
        .add_media_info_fixture(
            "clip.mp4",
            &json!({
                "streams": [{
                    "id": 0,
                    "codec": "h264",
                    "rotation": 0,
                    "flip": "none",
                    "extradata": [1, 2, 4]
                }]
            }),
        )
        .unwrap();

    let browser =
        MockBrowser::new(MockDemuxer::new().with_media_info("clip.mp4", clip_media_info()));
    let runner = CaseRunner::new(browser, &corpus.config());

    match expect_failure(runner.execute(&case_for(Scenario::MediaInfo, path)).await) {
        CaseFailure::Mismatch(report) => {
            assert_eq!(report.label, "MediaInfo");
            assert_eq!(report.mismatches.len(), 1);
            assert_eq!(report.mismatches[0].path, "streams[0].extradata[2]");
            let rendered = report.to_string();
            assert!(rendered.contains("Actual MediaInfo:"));
            assert!(rendered.contains("Expected MediaInfo:"));
            assert!(!rendered.contains("blob:"));
        }
        other => panic!("expected a mismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rotation_bug_fails_orientation_but_not_full_comparison() {
    let corpus = TestCorpus::new().unwrap();
    // fixture recorded while the demuxer dropped the display matrix
    let buggy = rotated_media_info(0, "none");
    let general = corpus.add_sample("rotated_90.mp4", MP4_SAMPLE_BYTES).unwrap();
    corpus.add_media_info_fixture("rotated_90.mp4", &buggy).unwrap();
    let rotated = corpus.add_orientation_sample("rotated_90.mp4", MP4_SAMPLE_BYTES).unwrap();
    corpus
        .add_orientation_fixture("rotated_90.mp4", &rotated_90_orientation())
        .unwrap();

    let browser = MockBrowser::new(MockDemuxer::new().with_media_info("rotated_90.mp4", buggy));
    let runner = CaseRunner::new(browser, &corpus.config());

    assert!(runner.execute(&case_for(Scenario::MediaInfo, general)).await.is_passed());
    match expect_failure(runner.execute(&case_for(Scenario::Orientation, rotated)).await) {
        CaseFailure::Mismatch(report) => {
            assert_eq!(report.label, "Orientation");
            assert_eq!(report.mismatches.len(), 1);
            assert_eq!(report.mismatches[0].path, "streams[0].rotation");
            assert_eq!(
                report.mismatches[0].kind,
                MismatchKind::ValueDiffers {
                    actual: json!(0),
                    expected: json!(90)
                }
            );
        }
        other => panic!("expected an orientation mismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_orientation_ignores_other_stream_fields() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_orientation_sample("rotated_90.mp4", MP4_SAMPLE_BYTES).unwrap();
    corpus
        .add_orientation_fixture("rotated_90.mp4", &rotated_90_orientation())
        .unwrap();

    let mut reported = rotated_media_info(90, "none");
    reported["streams"][0]["codec"] = json!("hevc");
    reported["streams"][0]["extradata"] = json!(null);
    let browser = MockBrowser::new(MockDemuxer::new().with_media_info("rotated_90.mp4", reported));
    let runner = CaseRunner::new(browser, &corpus.config());

    assert!(runner.execute(&case_for(Scenario::Orientation, path)).await.is_passed());
}

#[tokio::test]
async fn test_load_rejection_is_reported_verbatim() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_sample("broken.mp4", MP4_SAMPLE_BYTES).unwrap();
    corpus.add_media_info_fixture("broken.mp4", &clip_media_info()).unwrap();

    let browser =
        MockBrowser::new(MockDemuxer::new().with_load_error("broken.mp4", "moov atom not found"));
    let runner = CaseRunner::new(browser.clone(), &corpus.config());

    match expect_failure(runner.execute(&case_for(Scenario::MediaInfo, path)).await) {
        CaseFailure::Driver(e) => {
            assert_eq!(e.failure, DriverFailure::Load);
            assert_eq!(e.reached, CaseState::FileBound);
            assert_eq!(e.message, "moov atom not found");
            assert!(e.stack.as_deref().unwrap().contains("Demuxer.load"));
        }
        other => panic!("expected a load failure, got {:?}", other),
    }
    assert_eq!(browser.open_pages(), 0);
}

#[tokio::test]
async fn test_read_rejection_follows_successful_load() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();

    let demuxer = MockDemuxer::new()
        .with_media_info("clip.mp4", clip_media_info())
        .with_read_error("clip.mp4", "stream index out of range");
    let runner = CaseRunner::new(MockBrowser::new(demuxer), &corpus.config());

    match expect_failure(runner.execute(&case_for(Scenario::VideoPacket, path)).await) {
        CaseFailure::Driver(e) => {
            assert_eq!(e.failure, DriverFailure::Read);
            assert_eq!(e.reached, CaseState::Loaded);
            assert_eq!(e.message, "stream index out of range");
        }
        other => panic!("expected a read failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_binding_fails_at_load() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    let browser =
        MockBrowser::new(MockDemuxer::new().with_media_info("clip.mp4", clip_media_info()))
            .without_binding();
    let runner = CaseRunner::new(browser, &corpus.config());

    match expect_failure(runner.execute(&case_for(Scenario::AudioPacket, path)).await) {
        CaseFailure::Driver(e) => {
            assert_eq!(e.failure, DriverFailure::Load);
            assert!(e.message.contains("window.demuxer"));
        }
        other => panic!("expected a load failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_page_fails_navigation() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    let browser =
        MockBrowser::new(MockDemuxer::new()).with_navigation_error("net::ERR_CONNECTION_REFUSED");
    let runner = CaseRunner::new(browser.clone(), &corpus.config());

    match expect_failure(runner.execute(&case_for(Scenario::MediaInfo, path)).await) {
        CaseFailure::Driver(e) => {
            assert_eq!(e.failure, DriverFailure::Navigation);
            assert_eq!(e.reached, CaseState::Idle);
            assert!(e.message.contains("ERR_CONNECTION_REFUSED"));
        }
        other => panic!("expected a navigation failure, got {:?}", other),
    }
    assert_eq!(browser.open_pages(), 0);
}

#[tokio::test]
async fn test_wrong_selector_fails_bind() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    let browser = MockBrowser::new(MockDemuxer::new()).with_input_selector("#other-input");
    let runner = CaseRunner::new(browser, &corpus.config());

    match expect_failure(runner.execute(&case_for(Scenario::MediaInfo, path)).await) {
        CaseFailure::Driver(e) => {
            assert_eq!(e.failure, DriverFailure::Bind);
            assert_eq!(e.reached, CaseState::PageLoaded);
        }
        other => panic!("expected a bind failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_hanging_load_times_out_and_closes_page() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_sample("slow.mp4", MP4_SAMPLE_BYTES).unwrap();
    let demuxer = MockDemuxer::new()
        .with_media_info("slow.mp4", clip_media_info())
        .with_load_delay(Duration::from_secs(30));
    let browser = MockBrowser::new(demuxer);
    let config = corpus.config();
    let driver = SessionDriver::new(
        browser.clone(),
        DriverConfig {
            page_url: config.page_url.clone(),
            input_selector: config.input_selector.clone(),
        },
    );

    let err = driver
        .run(&SampleFile::new(path), DemuxerOp::GetMediaInfo, Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert_eq!(err.failure, DriverFailure::Timeout);
    assert_eq!(err.reached, CaseState::FileBound);
    assert_eq!(browser.open_pages(), 0);

    let page = browser.page_ids()[0];
    assert_eq!(browser.events_for(page).last(), Some(&PageEventKind::Closed));
}

#[tokio::test]
async fn test_zero_case_timeout_in_config_file_leaves_cases_unbounded() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    corpus.add_media_info_fixture("clip.mp4", &clip_media_info()).unwrap();

    let config_path = corpus.root().join("harness.json");
    let raw = json!({
        "samples_dir": corpus.config().samples_dir,
        "fixtures_dir": corpus.config().fixtures_dir,
        "case_timeout_secs": 0
    });
    std::fs::write(&config_path, raw.to_string()).unwrap();
    let config = HarnessConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.case_timeout(), None);

    let demuxer = MockDemuxer::new()
        .with_media_info("clip.mp4", clip_media_info())
        .with_load_delay(Duration::from_millis(50));
    let runner = CaseRunner::new(MockBrowser::new(demuxer), &config);

    let outcome = runner.execute(&case_for(Scenario::MediaInfo, path)).await;
    assert_eq!(outcome, CaseOutcome::Passed);
}

#[tokio::test]
async fn test_page_that_cannot_open_fails_only_its_case() {
    let corpus = TestCorpus::new().unwrap();
    corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    corpus.add_media_info_fixture("clip.mp4", &clip_media_info()).unwrap();

    let browser = MockBrowser::new(valid_packets(
        MockDemuxer::new().with_media_info("clip.mp4", clip_media_info()),
        "clip.mp4",
    ))
    .with_launch_errors(FailurePlan::OnCalls(vec![2]));
    let runner = CaseRunner::new(browser.clone(), &corpus.config());

    let mut outcomes = Vec::new();
    for case in build_matrix(&corpus.config()).unwrap() {
        outcomes.push((case.name(), runner.execute(&case).await));
    }

    assert!(outcomes[0].1.is_passed());
    assert_eq!(outcomes[1].0, "video_packet::clip.mp4");
    match expect_failure(outcomes[1].1.clone()) {
        CaseFailure::Driver(e) => {
            assert_eq!(e.failure, DriverFailure::Launch);
            assert_eq!(e.reached, CaseState::Idle);
            assert!(e.message.contains("launch failure"));
        }
        other => panic!("expected a launch failure, got {:?}", other),
    }
    assert!(outcomes[2].1.is_passed());
    assert_eq!(browser.stats().failures, 1);
    assert_eq!(browser.open_pages(), 0);
}

#[tokio::test]
async fn test_demuxer_breaking_mid_run_fails_later_cases_at_load() {
    let corpus = TestCorpus::new().unwrap();
    corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    corpus.add_media_info_fixture("clip.mp4", &clip_media_info()).unwrap();

    let demuxer = valid_packets(
        MockDemuxer::new().with_media_info("clip.mp4", clip_media_info()),
        "clip.mp4",
    )
    .with_failure_plan(FailurePlan::FromCall(2));
    let runner = CaseRunner::new(MockBrowser::new(demuxer.clone()), &corpus.config());

    let mut failed_at = Vec::new();
    for case in build_matrix(&corpus.config()).unwrap() {
        if let CaseOutcome::Failed(CaseFailure::Driver(e)) = runner.execute(&case).await {
            failed_at.push((case.name(), e.failure, e.reached));
        }
    }

    assert_eq!(
        failed_at,
        vec![
            ("video_packet::clip.mp4".to_string(), DriverFailure::Load, CaseState::FileBound),
            ("audio_packet::clip.mp4".to_string(), DriverFailure::Load, CaseState::FileBound),
        ]
    );
    assert_eq!(demuxer.stats().calls, 3);
    assert_eq!(demuxer.stats().bytes, 3 * MP4_SAMPLE_BYTES.len() as u64);
}

#[tokio::test]
async fn test_missing_fixture_fails_only_its_case() {
    let corpus = TestCorpus::new().unwrap();
    corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    corpus.add_sample("orphan.webm", WEBM_SAMPLE_BYTES).unwrap();
    corpus.add_media_info_fixture("clip.mp4", &clip_media_info()).unwrap();

    let demuxer = MockDemuxer::new()
        .with_media_info("clip.mp4", clip_media_info())
        .with_media_info("orphan.webm", clip_media_info());
    let demuxer = valid_packets(valid_packets(demuxer, "clip.mp4"), "orphan.webm");
    let runner = CaseRunner::new(MockBrowser::new(demuxer), &corpus.config());

    let cases = build_matrix(&corpus.config()).unwrap();
    assert_eq!(cases.len(), 6);

    for case in &cases {
        let outcome = runner.execute(case).await;
        if case.name() == "media_info::orphan.webm" {
            match expect_failure(outcome) {
                CaseFailure::Fixture(FixtureError::Missing(path)) => {
                    assert!(path.ends_with("orphan.json"))
                }
                other => panic!("expected a missing fixture, got {:?}", other),
            }
        } else {
            assert!(outcome.is_passed(), "{} should pass", case.name());
        }
    }
}

#[tokio::test]
async fn test_malformed_fixture_fails_case() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    corpus.add_raw_media_info_fixture("clip.mp4", "{\"streams\": [").unwrap();
    let runner = CaseRunner::new(
        MockBrowser::new(MockDemuxer::new().with_media_info("clip.mp4", clip_media_info())),
        &corpus.config(),
    );

    match expect_failure(runner.execute(&case_for(Scenario::MediaInfo, path)).await) {
        CaseFailure::Fixture(FixtureError::Malformed { .. }) => {}
        other => panic!("expected a malformed fixture, got {:?}", other),
    }
}

#[tokio::test]
async fn test_audio_packet_without_duration_passes_but_video_does_not() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    let demuxer = MockDemuxer::new()
        .with_packet(
            "clip.mp4",
            StreamKind::Audio,
            MockPacket::new(vec![0xff, 0xf1], 4.011, 0.0).with_duration(None),
        )
        .with_packet("clip.mp4", StreamKind::Video, MockPacket::new(vec![0, 0, 1], 4.0, 0.0));
    let runner = CaseRunner::new(MockBrowser::new(demuxer), &corpus.config());

    assert!(runner
        .execute(&case_for(Scenario::AudioPacket, path.clone()))
        .await
        .is_passed());
    match expect_failure(runner.execute(&case_for(Scenario::VideoPacket, path)).await) {
        CaseFailure::Packet(violations) => {
            assert_eq!(violations, vec![PacketViolation::DurationNotPositive(Some(0.0))])
        }
        other => panic!("expected a packet violation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_first_packet_timestamp_is_a_violation() {
    let corpus = TestCorpus::new().unwrap();
    let path = corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    let demuxer = MockDemuxer::new().with_packet(
        "clip.mp4",
        StreamKind::Video,
        MockPacket::new(vec![0, 0, 1], 0.0, 0.04),
    );
    let runner = CaseRunner::new(MockBrowser::new(demuxer), &corpus.config());

    match expect_failure(runner.execute(&case_for(Scenario::VideoPacket, path)).await) {
        CaseFailure::Packet(violations) => {
            assert_eq!(violations, vec![PacketViolation::TimestampNotPositive(Some(0.0))])
        }
        other => panic!("expected a packet violation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_every_case_gets_a_fresh_page_and_one_read() {
    let corpus = TestCorpus::new().unwrap();
    corpus.add_sample("clip.mp4", MP4_SAMPLE_BYTES).unwrap();
    corpus.add_media_info_fixture("clip.mp4", &clip_media_info()).unwrap();
    let demuxer = valid_packets(
        MockDemuxer::new().with_media_info("clip.mp4", clip_media_info()),
        "clip.mp4",
    );
    let browser = MockBrowser::new(demuxer);
    let config = corpus.config();
    let runner = CaseRunner::new(browser.clone(), &config);

    let cases = build_matrix(&config).unwrap();
    for case in &cases {
        assert!(runner.execute(case).await.is_passed(), "{} failed", case.name());
    }

    let pages = browser.page_ids();
    assert_eq!(pages.len(), cases.len());
    assert_eq!(browser.open_pages(), 0);
    for (page, case) in pages.iter().zip(&cases) {
        let events = browser.events_for(*page);
        assert_eq!(
            events,
            vec![
                PageEventKind::Opened,
                PageEventKind::Navigated(config.page_url.clone()),
                PageEventKind::FileBound("clip.mp4".to_string()),
                PageEventKind::Loaded("clip.mp4".to_string()),
                PageEventKind::Read(case.scenario.op(config.seek)),
                PageEventKind::Closed,
            ]
        );
    }
}

#[tokio::test]
async fn test_cases_can_run_concurrently() {
    let corpus = TestCorpus::new().unwrap();
    let mut names = Vec::new();
    let mut demuxer = MockDemuxer::new();
    for i in 0..4 {
        let name = format!("clip_{}.mp4", i);
        corpus.add_sample(&name, MP4_SAMPLE_BYTES).unwrap();
        corpus.add_media_info_fixture(&name, &clip_media_info()).unwrap();
        demuxer = valid_packets(demuxer.with_media_info(&name, clip_media_info()), &name);
        names.push(name);
    }
    let browser = MockBrowser::new(demuxer.with_load_delay(Duration::from_millis(10)));
    let runner = Arc::new(CaseRunner::new(browser.clone(), &corpus.config()));

    let cases = build_matrix(&corpus.config()).unwrap();
    let handles: Vec<_> = cases
        .into_iter()
        .map(|case| {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { (case.name(), runner.execute(&case).await) })
        })
        .collect();

    let outcomes = within(Duration::from_secs(10), futures::future::join_all(handles))
        .await
        .unwrap();
    let mut passed = 0;
    for joined in outcomes {
        let (name, outcome) = joined.unwrap();
        assert!(outcome.is_passed(), "{} failed: {:?}", name, outcome);
        passed += 1;
    }
    assert_eq!(passed, names.len() * 3);
    assert_eq!(browser.pages_opened(), passed);
    assert_eq!(browser.open_pages(), 0);
}

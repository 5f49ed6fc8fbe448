use std::{path::Path, time::Duration};

use tsumugi::{
    dash::SegmentCountMode,
    decrypt::DecryptionKey,
    pipeline::{merged_file_name, TrackOutcome},
    DashDownloaderBuilder, TsumugiError,
};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::{
    common::{init_tracing, sidx_box, RangeResponder, RecordingRemuxer, RemuxCall},
    AssertWrapper,
};

const KID: &str = "10000000-1000-1000-1000-100000000001";

fn template_mpd(duration: &str, audio_segment_duration: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" xmlns:cenc="urn:mpeg:cenc:2013" type="static" mediaPresentationDuration="{duration}">
  <Period id="0">
    <AdaptationSet id="0" contentType="video">
      <ContentProtection schemeIdUri="urn:mpeg:dash:mp4protection:2011" value="cenc" cenc:default_KID="{KID}"/>
      <SegmentTemplate duration="4" timescale="1" initialization="init-$RepresentationID$.mp4" media="seg-$RepresentationID$-$Number$.m4s" startNumber="1"/>
      <Representation id="v-low" bandwidth="100000" mimeType="video/mp4" codecs="avc1.4d401e"/>
      <Representation id="v-high" bandwidth="900000" mimeType="video/mp4" codecs="avc1.640028"/>
    </AdaptationSet>
    <AdaptationSet id="1" mimeType="audio/mp4">
      <SegmentTemplate duration="{audio_segment_duration}" timescale="1" initialization="init-$RepresentationID$.mp4" media="seg-$RepresentationID$-$Number$.m4s"/>
      <Representation id="a" bandwidth="128000" mimeType="audio/mp4" codecs="mp4a.40.2" audioSamplingRate="48000"/>
    </AdaptationSet>
  </Period>
</MPD>"#
    )
}

async fn serve(server: &MockServer, route: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Serves the template manifest at `/vod/asset/manifest.mpd` with three segments per track.
async fn template_server(audio_segment_duration: u32) -> MockServer {
    let server = MockServer::start().await;
    serve(
        &server,
        "/vod/asset/manifest.mpd",
        template_mpd("PT12S", audio_segment_duration).as_bytes(),
    )
    .await;
    serve(&server, "/vod/asset/init-v-high.mp4", b"VI").await;
    serve(&server, "/vod/asset/init-a.mp4", b"AI").await;
    for i in 1..=6 {
        let body = format!("V{i}");
        serve(&server, &format!("/vod/asset/seg-v-high-{i}.m4s"), body.as_bytes()).await;
        let body = format!("A{i}");
        serve(&server, &format!("/vod/asset/seg-a-{i}.m4s"), body.as_bytes()).await;
    }
    server
}

fn read(path: &Path) -> String {
    String::from_utf8(std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_template_tracks_are_assembled_and_merged() -> anyhow::Result<()> {
    init_tracing();
    let server = template_server(4).await;
    let output = tempfile::tempdir()?;
    let remuxer = RecordingRemuxer::default();

    // the doubled "asset" path segment is removed before fetching
    let report = DashDownloaderBuilder::new()
        .output_dir(output.path())
        .retry_delay(Duration::from_millis(1))
        .remuxer(remuxer.clone())
        .download(&format!("{}/vod/asset/asset/manifest.mpd", server.uri()))
        .await
        .assert_success();

    assert_eq!(report.tracks.len(), 2);
    assert_eq!(report.failed_tracks(), 0);
    assert_eq!(report.tracks[0].content_type.as_deref(), Some("video"));
    assert_eq!(report.tracks[1].content_type.as_deref(), Some("audio"));

    let merged = output.path().join(merged_file_name(KID));
    assert_eq!(report.merged.as_deref(), Some(merged.as_path()));
    assert_eq!(read(&merged), "VIV1V2V3AIA1A2A3");

    let calls = remuxer.calls();
    assert_eq!(
        calls,
        vec![RemuxCall::Merge {
            video: output.path().join("master_video.mp4"),
            audio: output.path().join("master_audio.mp4"),
            output: merged,
        }]
    );

    // merged inputs and the working directory are gone
    assert!(!output.path().join("master_video.mp4").exists());
    assert!(!output.path().join("master_audio.mp4").exists());
    assert!(!output.path().join("downloads").exists());

    // only the best video Representation was requested
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| !r.url.path().contains("v-low")));

    Ok(())
}

#[tokio::test]
async fn test_key_hands_tracks_to_decrypt() -> anyhow::Result<()> {
    let server = template_server(4).await;
    let output = tempfile::tempdir()?;
    let work_dir = output.path().join("staging");
    let remuxer = RecordingRemuxer::default();

    let report = DashDownloaderBuilder::new()
        .output_dir(output.path())
        .work_dir(&work_dir)
        .key(Some(DecryptionKey::from_hex("00112233445566778899aabbccddeeff")?))
        .remuxer(remuxer.clone())
        .download(&format!("{}/vod/asset/manifest.mpd", server.uri()))
        .await
        .assert_success();
    assert_eq!(report.failed_tracks(), 0);

    let calls = remuxer.calls();
    assert_eq!(calls.len(), 3);
    match &calls[0] {
        RemuxCall::Decrypt { key, input, output: decrypted } => {
            assert_eq!(key, "00112233445566778899aabbccddeeff");
            assert!(input.starts_with(&work_dir));
            assert_eq!(decrypted, &output.path().join("master_video.mp4"));
        }
        other => panic!("unexpected call {other:?}"),
    }
    assert!(matches!(&calls[1], RemuxCall::Decrypt { output: o, .. } if o.ends_with("master_audio.mp4")));
    assert!(matches!(&calls[2], RemuxCall::Merge { .. }));
    assert!(!work_dir.exists());

    Ok(())
}

#[tokio::test]
async fn test_segment_order_survives_delays() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let mpd = r#"<MPD type="static" mediaPresentationDuration="PT20S">
  <Period>
    <AdaptationSet contentType="video">
      <SegmentTemplate duration="2" timescale="1" initialization="init.mp4" media="$Number%03d$.m4s"/>
      <Representation id="v" bandwidth="1"/>
    </AdaptationSet>
  </Period>
</MPD>"#;
    serve(&server, "/manifest.mpd", mpd.as_bytes()).await;
    serve(&server, "/init.mp4", b"[init]").await;
    for i in 1..=10u64 {
        // earlier segments answer later
        Mock::given(method("GET"))
            .and(path(format!("/{i:03}.m4s")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(format!("[{i}]").into_bytes())
                    .set_delay(Duration::from_millis(20 * (10 - i))),
            )
            .mount(&server)
            .await;
    }

    let output = tempfile::tempdir()?;
    let report = DashDownloaderBuilder::new()
        .output_dir(output.path())
        .remuxer(RecordingRemuxer::default())
        .download(&format!("{}/manifest.mpd", server.uri()))
        .await
        .assert_success();

    assert!(matches!(
        &report.tracks[0].outcome,
        TrackOutcome::Completed { missing_segments, .. } if missing_segments.is_empty()
    ));
    assert_eq!(
        read(&output.path().join("master_video.mp4")),
        "[init][1][2][3][4][5][6][7][8][9][10]"
    );
    // a single track is never merged
    assert!(report.merged.is_none());

    Ok(())
}

#[tokio::test]
async fn test_failed_segment_leaves_gap() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let mpd = r#"<MPD type="static" mediaPresentationDuration="PT6S">
  <Period>
    <AdaptationSet>
      <SegmentTemplate duration="2" timescale="1" initialization="init.mp4" media="seg-$Number$.m4s"/>
      <Representation id="a" bandwidth="1" mimeType="audio/mp4"/>
    </AdaptationSet>
  </Period>
</MPD>"#;
    serve(&server, "/manifest.mpd", mpd.as_bytes()).await;
    serve(&server, "/init.mp4", b"I").await;
    serve(&server, "/seg-1.m4s", b"1").await;
    serve(&server, "/seg-3.m4s", b"3").await;
    Mock::given(method("GET"))
        .and(path("/seg-2.m4s"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let output = tempfile::tempdir()?;
    let report = DashDownloaderBuilder::new()
        .output_dir(output.path())
        .retries(2)
        .retry_delay(Duration::from_millis(1))
        .remuxer(RecordingRemuxer::default())
        .download(&format!("{}/manifest.mpd", server.uri()))
        .await
        .assert_success();

    match &report.tracks[0].outcome {
        TrackOutcome::Completed {
            output: track,
            missing_segments,
        } => {
            assert_eq!(missing_segments, &vec![1]);
            assert_eq!(read(track), "I13");
        }
        TrackOutcome::Failed(e) => panic!("track failed: {e}"),
    }
    assert_eq!(report.tracks[0].content_type.as_deref(), Some("audio"));

    Ok(())
}

#[tokio::test]
async fn test_indexed_and_single_file_tracks() -> anyhow::Result<()> {
    init_tracing();
    let server = MockServer::start().await;

    // init | sidx | segments | trailing bytes not referenced by the index
    let init = b"ftyp-moov-init!!".to_vec();
    let sidx = sidx_box(0, &[5, 7, 3, 0, 9]);
    let mut file = init.clone();
    file.extend(&sidx);
    file.extend(b"aaaaabbbbbbbccc");
    file.extend(b"zzzzzzzzz");
    let index_start = init.len();
    let index_end = index_start + sidx.len() - 1;

    let mpd = format!(
        r#"<MPD type="static" mediaPresentationDuration="PT30S">
  <Period>
    <AdaptationSet contentType="video">
      <Representation id="v" bandwidth="500000" mimeType="video/mp4">
        <BaseURL>video.mp4</BaseURL>
        <SegmentBase indexRange="{index_start}-{index_end}">
          <Initialization range="0-{}"/>
        </SegmentBase>
      </Representation>
    </AdaptationSet>
    <AdaptationSet contentType="audio">
      <Representation id="a" bandwidth="64000" mimeType="audio/mp4">
        <BaseURL>audio.mp4</BaseURL>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#,
        index_start - 1
    );
    serve(&server, "/media/manifest.mpd", mpd.as_bytes()).await;
    serve(&server, "/media/audio.mp4", b"whole-audio").await;
    Mock::given(method("GET"))
        .and(path("/media/video.mp4"))
        .respond_with(RangeResponder(file))
        .mount(&server)
        .await;

    let output = tempfile::tempdir()?;
    let remuxer = RecordingRemuxer::default();
    let report = DashDownloaderBuilder::new()
        .output_dir(output.path())
        .remuxer(remuxer.clone())
        .download(&format!("{}/media/manifest.mpd", server.uri()))
        .await
        .assert_success();

    assert_eq!(report.failed_tracks(), 0);
    assert_eq!(
        read(&output.path().join("master_video.mp4")),
        "ftyp-moov-init!!aaaaabbbbbbbccc"
    );
    assert_eq!(read(&output.path().join("master_audio.mp4")), "whole-audio");

    // no default_KID: nothing to name the merged file after
    assert!(report.merged.is_none());
    assert!(remuxer.calls().is_empty());

    // index, init and three segments; the zero size reference ends the list
    let video_requests = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/media/video.mp4")
        .count();
    assert_eq!(video_requests, 5);

    Ok(())
}

#[tokio::test]
async fn test_segment_count_mode() -> anyhow::Result<()> {
    // audio segments last 2s: six of them cover the presentation
    let server = template_server(2).await;

    let output = tempfile::tempdir()?;
    DashDownloaderBuilder::new()
        .output_dir(output.path())
        .remuxer(RecordingRemuxer::default())
        .download(&format!("{}/vod/asset/manifest.mpd", server.uri()))
        .await
        .assert_success();
    // the count of the first track sizes every track
    assert_eq!(read(&output.path().join(merged_file_name(KID))), "VIV1V2V3AIA1A2A3");

    let output = tempfile::tempdir()?;
    DashDownloaderBuilder::new()
        .output_dir(output.path())
        .segment_count_mode(SegmentCountMode::PerTrack)
        .remuxer(RecordingRemuxer::default())
        .download(&format!("{}/vod/asset/manifest.mpd", server.uri()))
        .await
        .assert_success();
    assert_eq!(
        read(&output.path().join(merged_file_name(KID))),
        "VIV1V2V3AIA1A2A3A4A5A6"
    );

    Ok(())
}

#[tokio::test]
async fn test_track_failure_does_not_stop_run() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let mpd = r#"<MPD type="static" mediaPresentationDuration="PT2S">
  <Period>
    <AdaptationSet contentType="audio">
      <SegmentTemplate duration="2" timescale="1" initialization="init.mp4" media="seg-$Number$.m4s"/>
      <Representation id="a" bandwidth="1"/>
    </AdaptationSet>
    <AdaptationSet contentType="text"/>
    <AdaptationSet contentType="video">
      <Representation id="v" bandwidth="1"/>
    </AdaptationSet>
    <AdaptationSet contentType="video">
      <Representation id="v2" bandwidth="1">
        <BaseURL>video.mp4</BaseURL>
        <SegmentBase indexRange="0-18446744073709551615">
          <Initialization range="0-10"/>
        </SegmentBase>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#;
    serve(&server, "/manifest.mpd", mpd.as_bytes()).await;
    serve(&server, "/init.mp4", b"I").await;
    serve(&server, "/seg-1.m4s", b"1").await;

    let output = tempfile::tempdir()?;
    let report = DashDownloaderBuilder::new()
        .output_dir(output.path())
        .remuxer(RecordingRemuxer::default())
        .download(&format!("{}/manifest.mpd", server.uri()))
        .await
        .assert_success();

    assert_eq!(report.tracks.len(), 4);
    assert!(matches!(report.tracks[0].outcome, TrackOutcome::Completed { .. }));
    assert!(matches!(
        report.tracks[1].outcome,
        TrackOutcome::Failed(TsumugiError::NoRepresentation)
    ));
    assert!(matches!(
        report.tracks[2].outcome,
        TrackOutcome::Failed(TsumugiError::MissingInitialization(_))
    ));
    // an index range that does not fit in 64 bits fails only its own track
    assert!(matches!(
        report.tracks[3].outcome,
        TrackOutcome::Failed(TsumugiError::InvalidByteRange(_))
    ));
    assert_eq!(read(&output.path().join("master_audio.mp4")), "I1");

    Ok(())
}

#[tokio::test]
async fn test_manifest_level_errors_are_fatal() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve(&server, "/broken.mpd", b"<MPD><Period></MPD>").await;
    serve(
        &server,
        "/empty.mpd",
        br#"<MPD mediaPresentationDuration="PT10S"><Period/></MPD>"#,
    )
    .await;
    serve(
        &server,
        "/zero.mpd",
        br#"<MPD mediaPresentationDuration="PT0S"><Period><AdaptationSet><Representation id="a"/></AdaptationSet></Period></MPD>"#,
    )
    .await;
    serve(
        &server,
        "/no-representation.mpd",
        br#"<MPD mediaPresentationDuration="PT10S"><Period><AdaptationSet/></Period></MPD>"#,
    )
    .await;

    let output = tempfile::tempdir()?;
    let downloader = DashDownloaderBuilder::new()
        .output_dir(output.path())
        .retry_delay(Duration::from_millis(1))
        .remuxer(RecordingRemuxer::default())
        .build();

    let uri = server.uri();
    let cases = [
        ("broken.mpd", "ManifestParse"),
        ("empty.mpd", "NoAdaptationSet"),
        ("zero.mpd", "InvalidDuration"),
        ("no-representation.mpd", "NoRepresentation"),
    ];
    for (name, expected) in cases {
        let error = match downloader.download(&format!("{uri}/{name}")).await {
            Ok(report) => panic!("{name} should fail, got {report:?}"),
            Err(e) => e,
        };
        assert!(error.is_fatal(), "{name}: {error}");
        assert!(format!("{error:?}").starts_with(expected), "{name}: {error:?}");
    }

    downloader.download("not a url").await.assert_error();
    // nothing was staged
    assert!(!output.path().join("downloads").exists());

    Ok(())
}

//! End-to-end conversions through headless Chrome
#![cfg(feature = "cdp")]

use pagecut::cdp::CdpLauncher;
use pagecut::{AsyncConverter, ConversionConfig, Converter, Error, ExclusionSet, RenderRequest, ScopeKind};
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use tiny_http::{Response, Server};

static INIT: Once = Once::new();

fn html(body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body).with_header(
        "Content-Type: text/html; charset=utf-8"
            .parse::<tiny_http::Header>()
            .unwrap(),
    )
}

/// Start a simple test HTTP server
fn start_test_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18081").unwrap();
            for request in server.incoming_requests() {
                let path = request.url().to_string();
                let response = match path.as_str() {
                    "/" => html(
                        r#"<!DOCTYPE html>
<html>
<head><title>Ad Page</title></head>
<body>
<div class="ad">A</div>
<p>Article body</p>
<iframe src="/inner"></iframe>
</body>
</html>"#,
                    ),
                    "/inner" => html(r#"<!DOCTYPE html><html><body><div class="ad">B</div></body></html>"#),
                    "/shadow" => html(
                        r#"<!DOCTYPE html>
<html>
<body>
<div class="ad">top ad</div>
<iframe src="http://127.0.0.1:18082/"></iframe>
<iframe src="/inner"></iframe>
<div id="host"></div>
<script>
document.getElementById('host')
    .attachShadow({ mode: 'open' })
    .innerHTML = '<div class="ad">shadow ad</div><p>shadow story</p>';
</script>
</body>
</html>"#,
                    ),
                    "/late" => html(
                        r#"<!DOCTYPE html>
<html>
<body>
<p>Feed</p>
<script>
setTimeout(function () {
    var ad = document.createElement('div');
    ad.className = 'ad';
    ad.textContent = 'late ad';
    document.body.appendChild(ad);
}, 200);
</script>
</body>
</html>"#,
                    ),
                    _ => Response::from_string("Not Found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });
        // A different port is a different origin, so frames served from here are opaque.
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18082").unwrap();
            for request in server.incoming_requests() {
                let _ = request.respond(html(r#"<!DOCTYPE html><html><body><div class="ad">foreign</div></body></html>"#));
            }
        });
        // Give the servers time to start
        std::thread::sleep(Duration::from_millis(100));
    });

    "http://127.0.0.1:18081".to_string()
}

fn converter(root: &Path) -> Converter<CdpLauncher> {
    Converter::new(
        CdpLauncher::default(),
        ConversionConfig {
            navigation_timeout: Duration::from_secs(20),
            output_root: Some(root.to_path_buf()),
            ..Default::default()
        },
    )
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_removes_ads_in_page_and_frame() {
    let base_url = start_test_server();
    let root = tempfile::tempdir().unwrap();

    let request = RenderRequest::new(format!("{}/", base_url))
        .with_output("report.pdf")
        .with_wait(Duration::ZERO)
        .with_exclusions(ExclusionSet::parse(".ad"));
    let summary = converter(root.path()).run(&request).expect("conversion failed");

    let initial = summary.initial.expect("exclusions ran");
    assert_eq!(initial.counts_for(".ad"), vec![1, 1]);
    assert!(initial.skipped_frames.is_empty());

    let bytes = std::fs::read(root.path().join("output").join("report.pdf")).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_removes_shadow_ads_and_skips_foreign_frames() {
    let base_url = start_test_server();
    let root = tempfile::tempdir().unwrap();

    let request = RenderRequest::new(format!("{}/shadow", base_url))
        .with_wait(Duration::ZERO)
        .with_exclusions(ExclusionSet::parse(".ad"));
    let summary = converter(root.path()).run(&request).expect("conversion failed");

    let initial = summary.initial.expect("exclusions ran");
    assert_eq!(initial.skipped_frames.len(), 1, "skipped: {:?}", initial.skipped_frames);
    assert!(initial.skipped_frames[0].label.contains("18082"));

    // document, the same-origin frame, then the shadow root
    assert_eq!(initial.counts_for(".ad"), vec![1, 1, 1]);
    let shadow = &initial.scopes[2];
    assert_eq!(shadow.kind, ScopeKind::Shadow);
    assert_eq!(shadow.report.total(), 1);
    assert_eq!(initial.failed_scopes, 0);
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_removes_late_insertions() {
    let base_url = start_test_server();
    let root = tempfile::tempdir().unwrap();

    let request = RenderRequest::new(format!("{}/late", base_url))
        .with_wait(Duration::ZERO)
        .with_exclusions(ExclusionSet::parse(".ad"));
    let summary = converter(root.path()).run(&request).expect("conversion failed");

    let watched = summary.watched.expect("watcher ran");
    assert_eq!(watched.outcome.total_removed(), 1);
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_unreachable_host_fails_without_output() {
    let root = tempfile::tempdir().unwrap();

    let request = RenderRequest::new("http://unreachable.invalid/").with_output("report.pdf");
    let err = converter(root.path()).run(&request).unwrap_err();

    assert!(matches!(err, Error::Navigation(_) | Error::Timeout(_)), "unexpected error: {:?}", err);
    assert!(!root.path().join("output").join("report.pdf").exists());
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_async_converter() {
    let base_url = start_test_server();
    let root = tempfile::tempdir().unwrap();

    let converter = AsyncConverter::new(Some(ConversionConfig {
        output_root: Some(root.path().to_path_buf()),
        ..Default::default()
    }));
    let request = RenderRequest::new(format!("{}/", base_url)).with_wait(Duration::ZERO);
    let summary = converter.convert(request).await.expect("conversion failed");
    assert!(summary.bytes > 0);

    converter.shutdown().await.unwrap();
}

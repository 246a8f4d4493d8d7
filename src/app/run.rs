use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use hyper::Request;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::cli::app_config::Cli;
use crate::http::transport::TimingTransport;

pub async fn main_with_error() -> Result<(), anyhow::Error> {
    let cli: Cli = Cli::parse();

    run(cli).await
}

async fn run(cli: Cli) -> Result<(), anyhow::Error> {
    let log_level = match cli.verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy()
        .add_directive("hyper_util=off".parse()?);
    let subscriber = tracing_subscriber::fmt()
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_max_level(log_level)
        .with_env_filter(filter)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let mut builder = TimingTransport::builder()
        .keep_alives(!cli.no_keepalive)
        .connect_timeout(Duration::from_secs(cli.connect_timeout))
        .tls_handshake_timeout(Duration::from_secs(cli.tls_timeout))
        .insecure(cli.skip_certificate_validate);
    if cli.max_time > 0 {
        builder = builder.total_timeout(Duration::from_secs(cli.max_time));
    }
    if let Some(path) = cli.certificate_path_option.as_ref() {
        builder = builder.ca_bundle(path);
    }
    let transport = builder.build()?;

    for i in 1..=cli.count {
        let request = build_request(&cli)?;
        let (outcome, timings) = transport.measure(request).await;
        match outcome {
            Ok(resp) => {
                let status = resp.status();
                // drain the body so the connection finishes cleanly
                let _ = resp.into_body().collect().await;
                if cli.json {
                    println!("{}", serde_json::to_string(&timings)?);
                } else {
                    println!("[{i}] {status} {timings}");
                }
            }
            Err(err) => {
                if cli.json {
                    println!("{}", serde_json::to_string(&timings)?);
                } else {
                    println!("[{i}] {timings}");
                }
                debug!("request failed: {err:#}");
            }
        }
    }

    Ok(())
}

fn build_request(cli: &Cli) -> Result<Request<Full<Bytes>>, anyhow::Error> {
    let uri: hyper::Uri = cli.url.parse()?;
    ensure!(
        matches!(uri.scheme_str(), Some("http") | Some("https")),
        "unsupported scheme in url: {}",
        cli.url
    );

    let mut method = String::from("GET");
    if cli.body_option.is_some() {
        method = String::from("POST");
    }
    if let Some(method_userdefined) = cli.method_option.as_ref() {
        method = method_userdefined.clone();
    }

    let mut request_builder = Request::builder().method(method.as_str()).uri(uri);
    let user_agent = cli
        .user_agent_option
        .as_deref()
        .unwrap_or(concat!("httptick/", env!("CARGO_PKG_VERSION")));
    request_builder = request_builder
        .header(USER_AGENT, HeaderValue::from_str(user_agent)?)
        .header(ACCEPT, HeaderValue::from_str("*/*")?);

    for x in &cli.headers {
        let split: Vec<&str> = x.splitn(2, ':').collect();
        ensure!(split.len() == 2, "header error: '{}'", x);
        request_builder = request_builder.header(
            HeaderName::from_str(split[0])?,
            HeaderValue::from_str(split[1].trim_start())?,
        );
    }

    let body_bytes = cli
        .body_option
        .as_ref()
        .map(|b| Bytes::from(b.clone()))
        .unwrap_or_default();

    Ok(request_builder.body(Full::new(body_bytes))?)
}

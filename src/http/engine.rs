use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error};
use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, CONNECTION, HOST};
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use pki_types::ServerName;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use crate::http::dialer::Dialer;
use crate::http::trace::{self, ClientTrace};
use crate::http::transport::{ResponseBody, Transport};

/// Default request engine: one connection per round trip, driven with
/// hyper's http1 client. Fires whatever trace hooks ride on the request's
/// extensions as each connection milestone is reached; a request without a
/// trace runs exactly the same, the hooks are just no-ops.
///
/// No pooling, no redirects, no retries. Layers above that want those wrap
/// this engine (or bring their own and fire the hooks themselves).
pub struct HttpEngine {
    dialer: Arc<dyn Dialer>,
    tls: TlsConnector,
    keep_alives: bool,
    tls_handshake_timeout: Duration,
    total_timeout: Option<Duration>,
}

impl HttpEngine {
    pub fn new(
        dialer: Arc<dyn Dialer>,
        tls_config: rustls::ClientConfig,
        keep_alives: bool,
        tls_handshake_timeout: Duration,
        total_timeout: Option<Duration>,
    ) -> Self {
        Self {
            dialer,
            tls: TlsConnector::from(Arc::new(tls_config)),
            keep_alives,
            tls_handshake_timeout,
            total_timeout,
        }
    }

    async fn perform(&self, mut req: Request<Full<Bytes>>) -> Result<Response<ResponseBody>, Error> {
        let trace = trace::from_request(&req);

        let uri = req.uri().clone();
        let host = uri
            .host()
            .ok_or_else(|| anyhow!("no host in uri: {uri}"))?
            .trim_matches(|c| c == '[' || c == ']')
            .to_string();
        let https = uri.scheme_str() == Some("https");
        let port = uri.port_u16().unwrap_or(if https { 443 } else { 80 });

        if !req.headers().contains_key(HOST) {
            req.headers_mut().insert(HOST, HeaderValue::from_str(&host)?);
        }
        if !self.keep_alives {
            req.headers_mut()
                .insert(CONNECTION, HeaderValue::from_static("close"));
        }

        let addr = resolve(&host, port, &trace).await?;
        debug!("connecting to {addr}");

        trace.connect_start();
        let stream = self
            .dialer
            .dial(addr)
            .await
            .with_context(|| format!("failed to connect to {addr}"))?;
        trace.connect_done();

        if https {
            let domain = ServerName::try_from(host.as_str())
                .map_err(|e| anyhow!("invalid server name {host}: {e}"))?
                .to_owned();
            trace.tls_start();
            let tls_stream = timeout(self.tls_handshake_timeout, self.tls.connect(domain, stream))
                .await
                .with_context(|| format!("tls handshake with {host} timed out"))?
                .with_context(|| format!("tls handshake with {host} failed"))?;
            trace.tls_done();
            send(TokioIo::new(tls_stream), req, &trace).await
        } else {
            send(TokioIo::new(stream), req, &trace).await
        }
    }
}

impl Transport for HttpEngine {
    fn round_trip(
        &self,
        req: Request<Full<Bytes>>,
    ) -> BoxFuture<'_, Result<Response<ResponseBody>, Error>> {
        Box::pin(async move {
            match self.total_timeout {
                Some(limit) => timeout(limit, self.perform(req))
                    .await
                    .with_context(|| format!("request timed out after {limit:?}"))?,
                None => self.perform(req).await,
            }
        })
    }
}

async fn send<I>(
    io: I,
    req: Request<Full<Bytes>>,
    trace: &Arc<ClientTrace>,
) -> Result<Response<ResponseBody>, Error>
where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .context("http handshake failed")?;
    tokio::task::spawn(async move {
        if let Err(err) = conn.await {
            debug!("connection closed with error: {err:?}");
        }
    });

    let resp = sender
        .send_request(req)
        .await
        .context("failed to send request")?;
    // The response head is in hand: the closest observable point to the
    // first response byte for this engine.
    trace.first_byte();

    Ok(resp.map(|body| body.boxed()))
}

/// Resolves `host` on the blocking pool, bracketing the lookup with the dns
/// hooks. Literal addresses skip resolution entirely, so neither dns
/// milestone fires for them.
async fn resolve(host: &str, port: u16, trace: &Arc<ClientTrace>) -> Result<SocketAddr, Error> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    trace.dns_start();
    let lookup_host = host.to_string();
    let mut addrs =
        tokio::task::spawn_blocking(move || (lookup_host, port).to_socket_addrs()).await??;
    trace.dns_done();

    addrs
        .next()
        .ok_or_else(|| anyhow!("no ip addresses found for host {host}"))
}

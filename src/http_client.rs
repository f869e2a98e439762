use reqwest::ClientBuilder;

use crate::config::UpstreamConfig;

// Streamed bodies can stay open for as long as the model keeps talking,
// so there is no total timeout. The read timeout is per read: it bounds a
// stalled upstream without cutting off a long but live stream.
fn upstream_builder(upstream: &UpstreamConfig) -> ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(upstream.connect_timeout)
        .read_timeout(upstream.read_timeout)
        .tcp_nodelay(true)
}

pub fn client_for_upstream(upstream: &UpstreamConfig) -> Result<reqwest::Client, reqwest::Error> {
    upstream_builder(upstream).build()
}

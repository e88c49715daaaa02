use std::time::Instant;

use reqwest::tls::TlsInfo;
use tracing::{debug, error};
use x509_parser::parse_x509_certificate;

use super::report;
use super::result::ProbeOutcome;
use crate::config::Target;

/// Parse a DER certificate and return its `NotAfter` as unix seconds.
pub fn certificate_not_after(der: &[u8]) -> Option<i64> {
    let (_, parsed) = parse_x509_certificate(der).ok()?;
    Some(parsed.validity().not_after.timestamp())
}

/// Expiry of the leaf certificate the server presented on this connection.
fn leaf_certificate_expiry(response: &reqwest::Response) -> Option<i64> {
    let info = response.extensions().get::<TlsInfo>()?;
    let der = info.peer_certificate()?;
    certificate_not_after(der)
}

/// Run one probe against `target`.
///
/// Never fails: build and transport errors are logged and folded into the
/// returned outcome. The only await is the request itself; the client's
/// timeout bounds it.
pub async fn probe_target(client: &reqwest::Client, target: &Target) -> ProbeOutcome {
    let request = match client.get(target.url()).build() {
        Ok(request) => request,
        Err(e) => {
            error!(
                target_name = target.name(),
                target_url = target.url(),
                error = %report(&e),
                "while creating http request"
            );
            return ProbeOutcome::request_not_built();
        }
    };

    let start = Instant::now();
    let result = client.execute(request).await;
    let duration = start.elapsed();

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            error!(
                target_name = target.name(),
                target_url = target.url(),
                error = %report(&e),
                timeout = e.is_timeout(),
                "while performing http request"
            );
            return ProbeOutcome::transport_error(duration);
        }
    };

    let status = response.status().as_u16();
    let certificate_expiry = if target.is_https() {
        let expiry = leaf_certificate_expiry(&response);
        if expiry.is_none() {
            debug!(
                target_name = target.name(),
                target_url = target.url(),
                "no peer certificate available"
            );
        }
        expiry
    } else {
        None
    };
    // The body is never read; dropping the response releases the connection.
    drop(response);

    ProbeOutcome::response(status, duration, certificate_expiry)
}

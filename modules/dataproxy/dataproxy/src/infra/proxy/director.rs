use std::net::IpAddr;

use http::HeaderMap;
use url::Url;

use super::headers;
use crate::domain::error::DomainError;
use crate::domain::model::RewritePlan;

/// Legacy query parameter carrying the data-source password.
const PASSWORD_PARAM: &str = "p";
const REDACTED: &str = "[REDACTED]";

/// Outbound request line and headers produced from a [`RewritePlan`].
#[derive(Debug)]
pub struct Outbound {
    pub url: Url,
    pub headers: HeaderMap,
}

/// Apply `plan` to the inbound headers.
///
/// Header order of operations: hop-by-hop/`Host`/`Content-Length` stripping,
/// plan removals, plan sets, `Host`, then `X-Forwarded-For`.
///
/// # Errors
///
/// Returns `DomainError::InvalidDataSource` if the target cannot form a URL.
pub fn direct(
    plan: &RewritePlan,
    inbound: &HeaderMap,
    client_ip: Option<IpAddr>,
    instance: &str,
) -> Result<Outbound, DomainError> {
    let url = build_url(plan, instance)?;

    let mut out = headers::prepare_outbound(inbound);
    for name in &plan.remove_headers {
        out.remove(name);
    }
    for (name, value) in &plan.set_headers {
        out.insert(name.clone(), value.clone());
    }
    headers::set_host_header(&mut out, &plan.target.authority());
    if let Some(ip) = client_ip {
        headers::append_forwarded_for(&mut out, ip);
    }

    Ok(Outbound { url, headers: out })
}

fn build_url(plan: &RewritePlan, instance: &str) -> Result<Url, DomainError> {
    let base = format!("{}://{}", plan.target.scheme, plan.target.authority());
    let mut url = Url::parse(&base).map_err(|e| DomainError::InvalidDataSource {
        detail: format!("{base}: {e}"),
        instance: instance.to_owned(),
    })?;
    url.set_path(&plan.path);
    // The query is already encoded; `set_query` only escapes bytes a URL cannot carry.
    if plan.query.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&plan.query));
    }
    Ok(url)
}

/// `url` with the legacy password query value masked, for logging.
#[must_use]
pub fn redacted_url(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == PASSWORD_PARAM) {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k == PASSWORD_PARAM {
                (k.into_owned(), REDACTED.to_owned())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();
    let mut masked = url.clone();
    masked.query_pairs_mut().clear().extend_pairs(&pairs);
    masked.to_string()
}

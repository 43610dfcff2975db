use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dataproxy_sdk::{DataSource, DataSourceKind};
use http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use http::{HeaderName, HeaderValue};

use super::model::{ProxyRequest, RewritePlan, Target};

/// Caller-supplied credential forwarded as `Authorization`. Never sent upstream itself.
pub const DS_AUTHORIZATION: HeaderName = HeaderName::from_static("x-ds-authorization");

/// Service token header added for data sources with token auth enabled.
pub const AUTH_TOKEN: HeaderName = HeaderName::from_static("x-auth-token");

/// Compute the outbound mutations for `req` against data source `ds`.
///
/// Pure: no I/O, no clock, no randomness. Rules are applied in order and a
/// later rule replaces what an earlier one set:
///
/// 1. variant path/query rule (legacy credentials appended to the raw query,
///    basic auth for v1); other variants keep the caller's query verbatim;
/// 2. data-source basic auth;
/// 3. caller `X-DS-Authorization`;
/// 4. `Cookie` / `Set-Cookie` removal;
/// 5. service token.
#[must_use]
pub fn build_rewrite_plan(
    ds: &DataSource,
    target: Target,
    req: &ProxyRequest,
    token: Option<&HeaderValue>,
) -> RewritePlan {
    let mut plan = match ds.kind {
        DataSourceKind::LegacyTimeSeriesV08 => {
            let suffix = format!("db/{}/{}", ds.database, req.proxy_path);
            let path = join_url_path(&target.base_path, &suffix);
            let query = form_urlencoded::Serializer::for_suffix(req.query.clone(), 0)
                .append_pair("u", &ds.user)
                .append_pair("p", ds.password.expose())
                .finish();
            RewritePlan::new(target, path, query)
        }
        DataSourceKind::TimeSeriesV1 => {
            let path = join_url_path(&target.base_path, &req.proxy_path);
            let mut plan = RewritePlan::new(target, path, req.query.clone());
            if !ds.basic_auth {
                plan.set_header(
                    AUTHORIZATION,
                    basic_auth_header(&ds.user, ds.password.expose()),
                );
            }
            plan
        }
        // Cloud metrics requests are delegated before planning; plain HTTP if one slips through.
        DataSourceKind::GenericHttp | DataSourceKind::CloudMetrics => {
            let path = join_url_path(&target.base_path, &req.proxy_path);
            RewritePlan::new(target, path, req.query.clone())
        }
    };

    if ds.basic_auth {
        plan.set_header(
            AUTHORIZATION,
            basic_auth_header(&ds.basic_auth_user, ds.basic_auth_password.expose()),
        );
    }

    if let Some(explicit) = req.headers.get(&DS_AUTHORIZATION) {
        let mut value = explicit.clone();
        value.set_sensitive(true);
        plan.set_header(AUTHORIZATION, value);
    }
    plan.remove_header(DS_AUTHORIZATION);

    plan.remove_header(COOKIE);
    plan.remove_header(SET_COOKIE);

    if let Some(token) = token {
        let mut value = token.clone();
        value.set_sensitive(true);
        plan.set_header(AUTH_TOKEN, value);
    }

    plan
}

/// `Basic base64(user:password)`, standard alphabet with padding.
#[must_use]
pub fn basic_auth_header(user: &str, password: &str) -> HeaderValue {
    let encoded = STANDARD.encode(format!("{user}:{password}"));
    // Base64 output is always a valid header value.
    let mut value = HeaderValue::try_from(format!("Basic {encoded}"))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
    value.set_sensitive(true);
    value
}

/// Join two path fragments with exactly one `/` between them.
/// An empty suffix leaves `base` unchanged.
#[must_use]
pub fn join_url_path(base: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        base.to_owned()
    } else if base.ends_with('/') && suffix.starts_with('/') {
        format!("{base}{}", &suffix[1..])
    } else if !base.ends_with('/') && !suffix.starts_with('/') {
        format!("{base}/{suffix}")
    } else {
        format!("{base}{suffix}")
    }
}

// Redirect handler: the only synchronous work here is reading the request
// and writing the response; resolution, enrichment, and recording are all
// handed off to pooled/async collaborators.

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use tracing::warn;
use uuid::Uuid;

use crate::app::AppState;
use crate::handlers::pages;
use crate::models::link::RedirectKind;
use crate::services::RequestContext;
use crate::utils::ResolveError;

const CACHE_CONTROL: &str = "private, max-age=0, no-cache";
const X_ROBOTS_TAG: &str = "noindex, nofollow";

pub async fn redirect(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(short_code): Path<String>,
) -> Response {
    if short_code.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing short code").into_response();
    }

    let mut ctx = state.context_pool.acquire();
    ctx.short_code.push_str(&short_code);
    ctx.domain.push_str(
        headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(&state.config.platform_default_domain),
    );
    ctx.ip_address.push_str(&client_ip(&headers, addr));
    ctx.user_agent.push_str(
        headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(""),
    );
    ctx.referer.push_str(
        headers
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(""),
    );
    ctx.accept_language.push_str(
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(""),
    );

    let response = match state.resolver.resolve(None, &ctx.domain, &ctx.short_code).await {
        Ok(entry) => {
            if entry.password_protected {
                html_response(StatusCode::OK, &pages::password_required_page(&ctx.short_code))
            } else {
                let is_bot = state.bot_classifier.is_bot(&ctx.user_agent);
                let platform = platform_tag(&ctx.user_agent);
                let destination = platform
                    .and_then(|p| entry.platform_override(p))
                    .map(str::to_string)
                    .unwrap_or(entry.destination.clone());

                let status = match entry.redirect_kind {
                    RedirectKind::Permanent => StatusCode::MOVED_PERMANENTLY,
                    RedirectKind::Temporary => StatusCode::FOUND,
                };

                if !is_bot || entry.track_bots {
                    submit_click_event(
                        &state,
                        entry.id,
                        entry.workspace_id,
                        &ctx,
                        is_bot,
                        entry.webhooks_enabled,
                        entry.realtime_enabled,
                    );
                }

                let mut response = axum::response::Redirect::to(&destination).into_response();
                *response.status_mut() = status;
                apply_common_headers(&mut response);
                response
            }
        }
        Err(ResolveError::NotFound) => {
            html_response(StatusCode::NOT_FOUND, &pages::not_found_page(&ctx.short_code))
        }
        Err(ResolveError::Expired) => {
            html_response(StatusCode::GONE, &pages::expired_page(&ctx.short_code))
        }
        Err(ResolveError::Disabled) => {
            html_response(StatusCode::FORBIDDEN, &pages::disabled_page(&ctx.short_code))
        }
        Err(ResolveError::PasswordRequired) => {
            html_response(StatusCode::OK, &pages::password_required_page(&ctx.short_code))
        }
        Err(e @ ResolveError::StoreUnavailable(_)) => {
            warn!("resolver failed for {}: {}", ctx.short_code, e);
            e.into_response()
        }
    };

    state.context_pool.release(ctx);
    response
}

fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| peer.ip().to_string())
}

fn platform_tag(user_agent: &str) -> Option<&'static str> {
    let lower = user_agent.to_lowercase();
    if lower.contains("iphone") || lower.contains("ipad") {
        Some("ios")
    } else if lower.contains("android") {
        Some("android")
    } else {
        None
    }
}

#[allow(clippy::too_many_arguments)]
fn submit_click_event(
    state: &AppState,
    link_id: Uuid,
    workspace_id: Uuid,
    ctx: &RequestContext,
    is_bot: bool,
    webhooks_enabled: bool,
    realtime_enabled: bool,
) {
    let mut event = state.event_pool.acquire();
    event.event_id = Uuid::new_v4();
    event.link_id = link_id;
    event.workspace_id = workspace_id;
    event.short_code.push_str(&ctx.short_code);
    event.ip_address.push_str(&ctx.ip_address);
    event.user_agent.push_str(&ctx.user_agent);
    event.referer.push_str(&ctx.referer);
    event.is_bot = is_bot;
    event.webhooks_enabled = webhooks_enabled;
    event.realtime_enabled = realtime_enabled;
    event.fill_utm_from_referer();

    if let Err(event) = state.pipeline.submit(event) {
        state.event_pool.release(event);
    }
}

fn apply_common_headers(response: &mut Response) {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    response.headers_mut().insert(
        "X-Robots-Tag",
        HeaderValue::from_static(X_ROBOTS_TAG),
    );
}

fn html_response(status: StatusCode, body: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body.to_string(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_tag_detects_ios() {
        assert_eq!(platform_tag("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)"), Some("ios"));
    }

    #[test]
    fn platform_tag_detects_android() {
        assert_eq!(platform_tag("Mozilla/5.0 (Linux; Android 14)"), Some("android"));
    }

    #[test]
    fn platform_tag_is_none_for_desktop() {
        assert_eq!(
            platform_tag("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)"),
            None
        );
    }
}

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result, bail},
    calbridge_common::CalendarProvider,
    calbridge_config::CalbridgeConfig,
    calbridge_oauth::{
        BrowserNavigator, CallbackHandler, CallbackOutcome, CallbackServer, FileFlowStore,
        Navigator, OAuthFlow, PrintNavigator, ProviderHandler, TokenApiClient,
    },
    tracing::{debug, warn},
    url::Url,
};

/// Extra time the callback server stays up after the outcome's own delay,
/// so the browser can load the landing page.
const LINGER_MARGIN: Duration = Duration::from_secs(2);

fn build_flow(config: &CalbridgeConfig, navigator: Arc<dyn Navigator>) -> Arc<OAuthFlow> {
    let store = Arc::new(FileFlowStore::in_dir(&config.resolved_data_dir()));
    debug!(path = %store.path().display(), "using pending-flow store");
    Arc::new(
        OAuthFlow::new(store, navigator)
            .with_ttl(Duration::from_secs(config.oauth.state_ttl_secs)),
    )
}

fn build_client(config: &CalbridgeConfig) -> Result<TokenApiClient> {
    let client = TokenApiClient::new(&config.token_endpoint())
        .with_context(|| format!("invalid token endpoint {}", config.token_endpoint()))?;
    Ok(match config.gateway.user_id.as_deref().map(str::trim) {
        Some(user_id) if !user_id.is_empty() => {
            client.with_identity(config.gateway.identity_header.clone(), user_id)
        },
        _ => {
            warn!("no gateway.user_id configured, the gateway will reject requests");
            client
        },
    })
}

fn build_handler(config: &CalbridgeConfig, flow: Arc<OAuthFlow>) -> Result<CallbackHandler> {
    let client = build_client(config)?;
    Ok(CallbackHandler::new(flow, Arc::new(client))
        .with_landing_path(config.oauth.landing_path.clone()))
}

/// Loopback address to listen on when the redirect URI points back at this
/// machine.
fn loopback_addr(redirect_uri: &Url) -> Option<SocketAddr> {
    let host = redirect_uri.host_str()?;
    if !matches!(host, "localhost" | "127.0.0.1" | "[::1]") {
        return None;
    }
    let port = redirect_uri.port_or_known_default()?;
    let ip = if host == "[::1]" {
        std::net::Ipv6Addr::LOCALHOST.into()
    } else {
        std::net::Ipv4Addr::LOCALHOST.into()
    };
    Some(SocketAddr::new(ip, port))
}

pub async fn connect(config: &CalbridgeConfig, provider: &str, no_browser: bool) -> Result<()> {
    let handler = ProviderHandler::for_name(provider, config)?;
    if !handler.is_configured() {
        bail!(handler.config_error());
    }

    let navigator: Arc<dyn Navigator> = if no_browser {
        Arc::new(PrintNavigator)
    } else {
        Arc::new(BrowserNavigator)
    };
    let flow = build_flow(config, navigator);
    let redirect_uri = Url::parse(handler.redirect_uri())
        .with_context(|| format!("invalid redirect URI {}", handler.redirect_uri()))?;

    let Some(addr) = loopback_addr(&redirect_uri) else {
        handler.initiate(&flow)?;
        println!(
            "The redirect URI {redirect_uri} is not served by this machine.\n\
             After signing in, run:\n  calbridge callback --url '<redirect URL>'"
        );
        return Ok(());
    };

    let callback = Arc::new(build_handler(config, Arc::clone(&flow))?);
    let mut server =
        CallbackServer::start_with_path(addr, Some(redirect_uri.path()), Arc::clone(&callback))
            .await?;

    println!("Connecting {}...", handler.name());
    handler.initiate(&flow)?;
    println!("Waiting for the browser on {redirect_uri} ...");

    let outcome = server
        .wait(Duration::from_secs(config.oauth.callback_timeout_secs))
        .await?;
    report(&outcome);

    let grace = outcome
        .navigation()
        .map_or(Duration::ZERO, |plan| plan.delay)
        + LINGER_MARGIN;
    server.linger(grace).await;

    match outcome {
        CallbackOutcome::Failed { message, .. } => bail!(message),
        _ => Ok(()),
    }
}

pub async fn callback(config: &CalbridgeConfig, url: &str) -> Result<()> {
    let redirect = Url::parse(url).context("invalid redirect URL")?;
    let flow = build_flow(config, Arc::new(PrintNavigator));
    let callback = build_handler(config, flow)?;

    let outcome = callback.handle(redirect.fragment().unwrap_or_default()).await;
    report(&outcome);
    if let CallbackOutcome::NoResponse = outcome {
        bail!("the URL carries no OAuth response");
    }
    callback.finish(&outcome, &redirect).await?;

    match outcome {
        CallbackOutcome::Failed { message, .. } => bail!(message),
        _ => Ok(()),
    }
}

fn report(outcome: &CallbackOutcome) {
    match outcome {
        CallbackOutcome::NoResponse => println!("No OAuth response received."),
        CallbackOutcome::Succeeded { response, .. } => println!("{}", response.message),
        CallbackOutcome::Failed { message, .. } => eprintln!("{message}"),
    }
}

pub fn providers(config: &CalbridgeConfig) {
    for provider in CalendarProvider::ALL {
        let handler = ProviderHandler::new(provider, config);
        if handler.is_configured() {
            println!(
                "  {provider:<10} {} (redirect: {})",
                handler.name(),
                handler.redirect_uri()
            );
        } else {
            println!("  {provider:<10} not configured: {}", handler.config_error());
        }
    }
}

pub async fn calendars(config: &CalbridgeConfig) -> Result<()> {
    let calendars = build_client(config)?.list_calendars().await?;
    if calendars.is_empty() {
        println!("No calendars connected.");
        return Ok(());
    }

    let now = chrono::Utc::now().timestamp_millis();
    for calendar in calendars {
        let expiry = if calendar.expires_at > now {
            let remaining = (calendar.expires_at - now) / 1000;
            format!("valid ({}h {}m remaining)", remaining / 3600, (remaining % 3600) / 60)
        } else {
            "expired".to_string()
        };
        println!(
            "{} [{expiry}] connected {}",
            calendar.provider, calendar.connected_at
        );
        if !calendar.scope.is_empty() {
            println!("    scope: {}", calendar.scope);
        }
    }
    Ok(())
}

pub async fn disconnect(config: &CalbridgeConfig, provider: &str) -> Result<()> {
    let provider: CalendarProvider = provider.parse()?;
    if build_client(config)?.disconnect(provider.as_str()).await? {
        println!("Disconnected {provider}");
    } else {
        println!("No {provider} calendar was connected.");
    }
    Ok(())
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_only_for_local_redirects() {
        let local = Url::parse("http://localhost:18791/oauth/google/callback").unwrap();
        assert_eq!(
            loopback_addr(&local),
            Some(SocketAddr::from(([127, 0, 0, 1], 18791)))
        );

        let remote = Url::parse("https://calendar.example.com/oauth/callback").unwrap();
        assert_eq!(loopback_addr(&remote), None);
    }
}

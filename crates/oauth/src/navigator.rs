//! Sending the user agent somewhere else.

use {tracing::warn, url::Url};

/// The browser's "go to this URL" primitive.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &Url) -> anyhow::Result<()>;
}

/// Opens the system browser, printing the URL when no browser can be launched.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn navigate(&self, url: &Url) -> anyhow::Result<()> {
        println!("Opening browser...");
        if let Err(e) = open::that(url.as_str()) {
            warn!(error = %e, "could not open browser");
            println!("Could not open browser. Please visit:\n{url}");
        }
        Ok(())
    }
}

/// Prints the URL for the user to open by hand (headless machines).
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate(&self, url: &Url) -> anyhow::Result<()> {
        println!("Open this URL in your browser:\n{url}");
        Ok(())
    }
}

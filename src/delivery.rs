// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::episode::DownloadedEpisode;

/// How downloaded episodes are handed off to the rest of the system.
///
/// The orchestrator delivers each episode either to a user script or to the
/// platform's default handler; this trait is the seam that keeps those side
/// effects out of the orchestrator's tests.
#[async_trait]
pub trait DeliveryAgent: Send + Sync {
    /// Run the user's script with the episode's file path or URL as its one
    /// argument. Returns whether the script succeeded.
    async fn run_script(&self, script: &Path, argument: &str) -> bool;

    /// Hand the episode's file or magnet URL to the default handler, without
    /// waiting for it.
    fn open_in_background(&self, target: &str);
}

/// The argument a delivery sees: the local file if one was written, else the
/// episode's URL (always the case for unsaved magnet links).
pub fn delivery_argument(episode: &DownloadedEpisode) -> String {
    match &episode.local_path {
        Some(path) => path.display().to_string(),
        None => episode.episode.url.to_string(),
    }
}

/// Delivery through the real system: spawned script processes and the
/// platform opener.
pub struct DefaultDelivery;

#[async_trait]
impl DeliveryAgent for DefaultDelivery {
    async fn run_script(&self, script: &Path, argument: &str) -> bool {
        info!(script = %script.display(), argument, "running download script");

        let status = tokio::process::Command::new(script)
            .arg(argument)
            .status()
            .await;

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                warn!(script = %script.display(), %status, "download script failed");
                false
            }
            Err(e) => {
                warn!(script = %script.display(), "could not run download script: {e}");
                false
            }
        }
    }

    fn open_in_background(&self, target: &str) {
        if let Err(e) = open::that_detached(target) {
            warn!(target, "could not open downloaded episode: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use url::Url;

    use crate::episode::Episode;

    fn downloaded(url: &str, local_path: Option<&str>) -> DownloadedEpisode {
        DownloadedEpisode {
            episode: Episode {
                title: "Ep".to_string(),
                url: Url::parse(url).unwrap(),
                show_name: None,
                feed: None,
            },
            local_path: local_path.map(PathBuf::from),
        }
    }

    #[test]
    fn local_file_wins_over_url() {
        let episode = downloaded("http://x/a.torrent", Some("/downloads/a.torrent"));
        assert_eq!(delivery_argument(&episode), "/downloads/a.torrent");
    }

    #[test]
    fn unsaved_magnet_falls_back_to_the_url() {
        let episode = downloaded("magnet:?xt=urn:btih:abc", None);
        assert_eq!(delivery_argument(&episode), "magnet:?xt=urn:btih:abc");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn script_exit_status_maps_to_success() {
        let delivery = DefaultDelivery;

        assert!(delivery.run_script(Path::new("/bin/true"), "arg").await);
        assert!(!delivery.run_script(Path::new("/bin/false"), "arg").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_script_is_a_failure() {
        let delivery = DefaultDelivery;
        assert!(
            !delivery
                .run_script(Path::new("/no/such/script"), "arg")
                .await
        );
    }
}

//! Profile settings.

use cartwise_core::{OperationKind, ProfileSettings, SettingsPatch};
use chrono::Utc;
use tracing::{debug, warn};

use super::payload::encode;
use super::{Mutation, Store, WriteOutcome, encode_record};
use crate::engine::Collection;
use crate::notifier::{ChangeAction, ChangeTopic};

impl Store {
    /// Current settings.
    ///
    /// The first read stores defaults. That write is best effort: it is not
    /// queued and emits no event. When the settings cannot be read at all,
    /// defaults are returned and nothing is written.
    pub async fn settings(&self) -> ProfileSettings {
        match self
            .lookup::<ProfileSettings>(Collection::Settings, ProfileSettings::KEY)
            .await
        {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                let defaults = ProfileSettings::default();
                match encode_record(&defaults) {
                    Ok(value) => self.store_default_settings(&value).await,
                    Err(e) => warn!(error = %e, "Could not encode default settings"),
                }
                defaults
            }
            Err(e) => {
                warn!(error = %e, "Settings unreadable, using defaults");
                ProfileSettings::default()
            }
        }
    }

    async fn store_default_settings(&self, value: &serde_json::Value) {
        if self
            .is_queued(Collection::Settings, ProfileSettings::KEY)
            .await
        {
            return;
        }
        if let Some(engine) = &self.primary {
            match engine
                .put(Collection::Settings, ProfileSettings::KEY, value)
                .await
            {
                Ok(()) => debug!("Default settings stored"),
                Err(e) => debug!(error = %e, "Could not store default settings"),
            }
        }
        if let Err(e) = self
            .update_shadow(
                Collection::Settings,
                ProfileSettings::KEY,
                &Mutation::Put(value),
            )
            .await
        {
            debug!(error = %e, "Could not shadow default settings");
        }
    }

    /// Merges `patch` into the settings.
    pub async fn update_settings(&self, patch: SettingsPatch) -> WriteOutcome<ProfileSettings> {
        let mut settings = match self
            .lookup::<ProfileSettings>(Collection::Settings, ProfileSettings::KEY)
            .await
        {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e) => return WriteOutcome::Failed(e),
        };
        if let Err(e) = settings.apply(&patch, Utc::now()) {
            return WriteOutcome::Failed(e.into());
        }
        let (value, payload) = match (encode_record(&settings), encode(&patch)) {
            (Ok(value), Ok(payload)) => (value, payload),
            (Err(e), _) | (_, Err(e)) => return WriteOutcome::Failed(e),
        };

        match self
            .write(
                Collection::Settings,
                ProfileSettings::KEY,
                Mutation::Put(&value),
                OperationKind::UpdateSettings,
                payload,
            )
            .await
        {
            Ok(written) => {
                self.emit(ChangeTopic::Settings, ChangeAction::Update, &settings);
                written.outcome(settings)
            }
            Err(e) => WriteOutcome::Failed(e),
        }
    }
}

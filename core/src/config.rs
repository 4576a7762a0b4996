// flowgate/src/config.rs

//! Runtime settings for the orchestrator and the procurement pipeline, loaded from
//! the environment (and a `.env` file when present).

use crate::error::{FlowError, FlowResult};
use std::env;
use std::str::FromStr;
use tracing::{event, Level};

/// Driver-loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
  /// Upper bound on step invocations within one `start`/`resume` call. Keeps a
  /// selector cycle from spinning forever.
  pub max_steps_per_call: usize,
  /// Actor name written on history entries produced by the driver loop.
  pub actor: String,
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      max_steps_per_call: 64,
      actor: "orchestrator".to_string(),
    }
  }
}

impl OrchestratorConfig {
  /// Reads `FLOWGATE_MAX_STEPS_PER_CALL` and `FLOWGATE_ACTOR`; unset variables keep
  /// their defaults.
  pub fn from_env() -> FlowResult<Self> {
    dotenvy::dotenv().ok();
    let defaults = Self::default();

    let max_steps_per_call = parse_var("FLOWGATE_MAX_STEPS_PER_CALL")?.unwrap_or(defaults.max_steps_per_call);
    if max_steps_per_call == 0 {
      return Err(FlowError::Config {
        message: "FLOWGATE_MAX_STEPS_PER_CALL must be at least 1".to_string(),
      });
    }
    let actor = env::var("FLOWGATE_ACTOR").unwrap_or(defaults.actor);

    event!(Level::INFO, max_steps_per_call, %actor, "Orchestrator configuration loaded.");
    Ok(Self {
      max_steps_per_call,
      actor,
    })
  }
}

/// How the supplier step picks among quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplierSelection {
  /// Lowest unit price wins, no human in the loop.
  Cheapest,
  /// Suspend and let the caller pick.
  Manual,
}

impl FromStr for SupplierSelection {
  type Err = FlowError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "cheapest" => Ok(SupplierSelection::Cheapest),
      "manual" => Ok(SupplierSelection::Manual),
      other => Err(FlowError::Config {
        message: format!("unknown supplier selection mode '{}' (expected cheapest|manual)", other),
      }),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcurementSettings {
  pub manager_email: String,
  pub reminder_interval_minutes: u32,
  pub supplier_selection: SupplierSelection,
  pub currency: String,
}

impl Default for ProcurementSettings {
  fn default() -> Self {
    Self {
      manager_email: "manager@example.com".to_string(),
      reminder_interval_minutes: 60,
      supplier_selection: SupplierSelection::Cheapest,
      currency: "TL".to_string(),
    }
  }
}

impl ProcurementSettings {
  pub fn from_env() -> FlowResult<Self> {
    dotenvy::dotenv().ok();
    let defaults = Self::default();

    let manager_email = env::var("PROCUREMENT_MANAGER_EMAIL").unwrap_or(defaults.manager_email);
    let reminder_interval_minutes =
      parse_var("PROCUREMENT_REMINDER_MINUTES")?.unwrap_or(defaults.reminder_interval_minutes);
    let supplier_selection = match env::var("PROCUREMENT_SUPPLIER_SELECTION") {
      Ok(raw) => raw.parse()?,
      Err(_) => defaults.supplier_selection,
    };
    let currency = env::var("PROCUREMENT_CURRENCY").unwrap_or(defaults.currency);

    event!(Level::INFO, ?supplier_selection, reminder_interval_minutes, "Procurement settings loaded.");
    Ok(Self {
      manager_email,
      reminder_interval_minutes,
      supplier_selection,
      currency,
    })
  }
}

fn parse_var<T>(name: &str) -> FlowResult<Option<T>>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match env::var(name) {
    Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| FlowError::Config {
      message: format!("Invalid {}: {}", name, e),
    }),
    Err(_) => Ok(None),
  }
}

//! Newline-delimited JSON protocol of the `slotguard` binary: one command per
//! input line, one reply per output line.

use serde::Deserialize;
use serde_json::{json, Value};
use ulid::Ulid;

use crate::admission::{AdmitMode, ErrorReport, ValidationError};
use crate::model::{BookingDraft, Provider};
use crate::service::BookingService;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    RegisterCustomer {
        id: Ulid,
        name: String,
    },
    RegisterProvider {
        id: Ulid,
        name: String,
        #[serde(default)]
        is_verified: bool,
        #[serde(default)]
        is_available: bool,
    },
    SetProviderFlags {
        id: Ulid,
        is_verified: bool,
        is_available: bool,
    },
    Admit {
        mode: AdmitMode,
        draft: BookingDraft,
        /// Validate only; nothing is stored.
        #[serde(default)]
        dry_run: bool,
    },
}

fn rejected(e: &ValidationError) -> Value {
    json!({ "ok": false, "error": ErrorReport::from(e) })
}

/// Execute one command line and build its reply.
pub async fn handle_line(service: &BookingService, line: &str) -> Value {
    let command: Command = match serde_json::from_str(line) {
        Ok(c) => c,
        Err(e) => {
            return json!({
                "ok": false,
                "error": { "kind": "malformed_command", "message": e.to_string() },
            });
        }
    };

    let ledger = service.ledger();
    let outcome = match command {
        Command::RegisterCustomer { id, name } => {
            ledger.upsert_customer(id, name).await.map(|()| json!({ "ok": true }))
        }
        Command::RegisterProvider { id, name, is_verified, is_available } => ledger
            .upsert_provider(Provider { id, name, is_verified, is_available })
            .await
            .map(|()| json!({ "ok": true })),
        Command::SetProviderFlags { id, is_verified, is_available } => ledger
            .set_provider_flags(id, is_verified, is_available)
            .await
            .map(|provider| json!({ "ok": true, "provider": provider })),
        Command::Admit { mode, draft, dry_run } => {
            let result = if dry_run {
                service.admit(draft, mode).await
            } else {
                service.submit(draft, mode).await
            };
            result.map(|v| {
                json!({
                    "ok": true,
                    "stored": !dry_run,
                    "booking": v.booking(),
                    "warnings": v.warnings(),
                })
            })
        }
    };

    outcome.unwrap_or_else(|e| rejected(&e))
}

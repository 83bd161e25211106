//! Itinerary persistence tool.
//!
//! Validation and persistence are split: the tool owns the argument
//! schema and user-id check, the injected [`ItineraryStore`] owns the
//! write. The model is instructed (via the save-intent prompt) to call
//! this only when the user explicitly asks to save.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::store::{Itinerary, ItineraryDay, ItineraryStore};

use super::{Tool, ToolContext};

/// Save a generated itinerary for the current user.
pub struct SaveItinerary {
    store: Arc<dyn ItineraryStore>,
}

/// Argument payload, mirroring the stored itinerary shape.
#[derive(Debug, Deserialize)]
struct SaveItineraryArgs {
    #[serde(default)]
    user_id: Option<String>,
    destination: String,
    duration: String,
    days: Vec<ItineraryDay>,
}

impl SaveItinerary {
    pub fn new(store: Arc<dyn ItineraryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SaveItinerary {
    fn name(&self) -> &str {
        "save_itinerary"
    }

    fn description(&self) -> &str {
        "Save a day-by-day itinerary for the current user. Call this only when the user explicitly asks to save or add the itinerary."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": {
                    "type": "string",
                    "description": "Owner of the itinerary. Leave empty to use the current user."
                },
                "destination": {
                    "type": "string",
                    "description": "Destination name, e.g. 'Huế'"
                },
                "duration": {
                    "type": "string",
                    "description": "Trip length, e.g. '3 ngày 2 đêm'"
                },
                "days": {
                    "type": "array",
                    "description": "One entry per day",
                    "items": {
                        "type": "object",
                        "properties": {
                            "morning": { "$ref": "#/definitions/block" },
                            "afternoon": { "$ref": "#/definitions/block" },
                            "evening": { "$ref": "#/definitions/block" }
                        },
                        "required": ["morning", "afternoon", "evening"]
                    }
                }
            },
            "required": ["destination", "duration", "days"],
            "definitions": {
                "block": {
                    "type": "object",
                    "properties": {
                        "description": { "type": "string" },
                        "cost": { "type": "number", "description": "Estimated cost in VND" }
                    },
                    "required": ["description", "cost"]
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let args: SaveItineraryArgs = serde_json::from_value(args)
            .map_err(|e| anyhow::anyhow!("Invalid itinerary payload: {}", e))?;

        if args.days.is_empty() {
            return Err(anyhow::anyhow!("Itinerary must contain at least one day"));
        }

        // The caller-asserted id is authoritative; a conflicting id from the
        // model is refused rather than written under the wrong owner.
        match args.user_id.as_deref() {
            None | Some("") => {}
            Some(id) if id == ctx.user_id => {}
            Some(id) => {
                return Err(anyhow::anyhow!(
                    "user_id '{}' does not match the current user",
                    id
                ));
            }
        }

        let itinerary = Itinerary {
            user_id: ctx.user_id.clone(),
            destination: args.destination.clone(),
            duration: args.duration,
            days: args.days,
        };

        self.store
            .insert(&itinerary)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to save itinerary: {}", e))?;

        tracing::info!(user_id = %ctx.user_id, destination = %args.destination, "itinerary saved");

        Ok(format!(
            "Lịch trình cho {} đã được thêm thành công.",
            args.destination
        ))
    }
}

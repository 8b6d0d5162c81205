// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Edge-server discovery
//!
//! Filters the cached catalog. When `includeDistance` is set, the client's
//! vantage point is approximated by the edge colo the trace endpoint
//! reports, since the trace itself carries no coordinates.

use super::params::{parse_params, ServerInfoParams};
use super::{ToolContext, ToolHandler};
use crate::catalog::CACHE_TTL_MS;
use crate::mcp::protocol::Tool;
use async_trait::async_trait;
use netgauge_core::{CatalogFilter, OperationClass, ToolError, UserLocation};
use serde_json::json;

/// `get_server_info`: filtered view of the edge-server catalog.
pub struct ServerInfoTool;

impl ServerInfoTool {
    /// Best-effort vantage point from the trace's reported colo.
    async fn user_location(ctx: &ToolContext, deadline_ms: u64) -> Option<UserLocation> {
        let trace = ctx.probe.get_trace(deadline_ms).await.ok()?;
        if trace.colo == "unknown" {
            return None;
        }
        let colo = ctx.catalog.get(&trace.colo).await.ok()??;
        match (colo.latitude, colo.longitude) {
            (Some(latitude), Some(longitude)) => Some(UserLocation {
                latitude: Some(latitude),
                longitude: Some(longitude),
            }),
            _ => None,
        }
    }
}

#[async_trait]
impl ToolHandler for ServerInfoTool {
    fn name(&self) -> &'static str {
        "get_server_info"
    }

    fn definition(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: Some(
                "Discover edge servers, optionally filtered by continent, country, or \
                 region, sorted by distance from the client when requested."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "timeout": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 300,
                        "description": "Overall discovery timeout in seconds"
                    },
                    "serverLocation": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Preferred edge server code (e.g. 'LAX')"
                    },
                    "continent": {
                        "type": "string",
                        "enum": ["north-america", "south-america", "europe", "asia", "africa", "oceania"],
                        "description": "Restrict to one continent"
                    },
                    "country": {
                        "type": "string",
                        "pattern": "^[A-Z]{2}$",
                        "description": "ISO 3166-1 alpha-2 country code"
                    },
                    "region": {
                        "type": "string",
                        "description": "Region or state name"
                    },
                    "maxDistance": {
                        "type": "number",
                        "minimum": 0,
                        "description": "Keep only servers within this many kilometers (needs distance data)"
                    },
                    "includeDistance": {
                        "type": "boolean",
                        "default": false,
                        "description": "Enrich entries with distance from the client"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 100,
                        "default": 20,
                        "description": "Maximum servers to return"
                    }
                },
                "additionalProperties": false
            }),
        }
    }

    fn operation_class(&self) -> OperationClass {
        OperationClass::ConnectionInfo
    }

    fn default_timeout_ms(&self) -> u64 {
        CACHE_TTL_MS
    }

    fn validate(&self, arguments: &serde_json::Value) -> Result<(), ToolError> {
        parse_params::<ServerInfoParams>(arguments)?.validate()
    }

    async fn run(
        &self,
        ctx: &ToolContext,
        arguments: serde_json::Value,
        deadline_ms: u64,
    ) -> Result<serde_json::Value, ToolError> {
        let params: ServerInfoParams = parse_params(&arguments)?;
        let filter = CatalogFilter {
            name: None,
            continent: params.continent,
            country: params.country.clone(),
            region: params.region.clone(),
            max_distance: params.max_distance,
        };

        let user_location = if params.include_distance {
            Self::user_location(ctx, deadline_ms).await
        } else {
            None
        };

        let servers = ctx.catalog.list(&filter, user_location).await?;
        let total = servers.len();
        let limited: Vec<_> = servers.into_iter().take(params.limit as usize).collect();
        let stats = ctx.catalog.stats().await;

        let mut data = json!({
            "servers": limited,
            "totalServers": total,
            "filterApplied": filter,
            "stats": stats,
        });
        if let Some(location) = user_location {
            data["userLocation"] = serde_json::to_value(location)
                .map_err(|e| ToolError::execution(format!("shaping failed: {}", e)))?;
        }

        Ok(data)
    }
}

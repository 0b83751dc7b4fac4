use std::{fmt::Write, path::Path};

use base64::{Engine, engine::general_purpose::STANDARD};
use craftping::{BedrockResponse, BedrockServer, JavaServer, QueryResponse, StatusResponse};

use crate::{
    Failure,
    structures::{JsonReport, PlayerSample},
};

const FAVICON_PREFIX: &str = "data:image/png;base64,";

pub async fn ping(server: &JavaServer) -> Result<String, Failure> {
    let latency = server.ping_async().await?;
    Ok(format!("{latency:.3}ms"))
}

pub async fn status(server: &JavaServer, favicon: Option<&Path>) -> Result<String, Failure> {
    let response = server.status_async().await?;
    if let Some(path) = favicon {
        let icon = response.favicon.as_deref().ok_or(Failure::NoFavicon)?;
        std::fs::write(path, decode_favicon(icon)?)?;
        info!(path = %path.display(), "wrote favicon");
    }
    Ok(render_status(&response))
}

pub async fn query(server: &JavaServer) -> Result<String, Failure> {
    let response = server.query_async().await?;
    Ok(render_query(server, &response))
}

pub async fn bedrock(server: &BedrockServer) -> Result<String, Failure> {
    let response = server.status_async().await?;
    Ok(render_bedrock(&response))
}

/// Runs ping, status and query in turn, stopping at the first failure.
///
/// A server that does not answer the ping is a [`Failure::Offline`], which
/// still carries the (empty) report.
pub async fn json(server: &JavaServer) -> Result<String, Failure> {
    let mut report = JsonReport::default();
    if let Err(e) = fill_report(server, &mut report).await {
        if !report.online {
            return Err(Failure::Offline {
                report: serde_json::to_string(&report)?,
                source: e,
            });
        }
        warn!(error = %e, "could not gather everything");
    }
    Ok(serde_json::to_string(&report)?)
}

async fn fill_report(server: &JavaServer, report: &mut JsonReport) -> Result<(), craftping::Error> {
    report.ping = Some(server.ping_async().await?);
    report.online = true;
    apply_status(report, &server.status_async().await?);
    apply_query(report, &server.query_async().await?);
    Ok(())
}

pub fn apply_status(report: &mut JsonReport, status: &StatusResponse) {
    report.version = Some(status.version.name.clone());
    report.protocol = Some(status.version.protocol);
    report.motd = Some(status.description.clone());
    report.player_count = Some(status.players.online);
    report.player_max = Some(status.players.max);
    report.players = status
        .players
        .sample
        .iter()
        .flatten()
        .map(|player| PlayerSample {
            name: player.name.clone(),
            id: Some(player.id.clone()),
        })
        .collect();
}

pub fn apply_query(report: &mut JsonReport, query: &QueryResponse) {
    report.host_ip = query.raw.get("hostip").cloned();
    report.host_port = query.raw.get("hostport").and_then(|port| port.parse().ok());
    report.map = Some(query.map.clone());
    report.plugins = Some(query.software.plugins.clone());
    report.players = query
        .players
        .names
        .iter()
        .map(|name| PlayerSample {
            name: name.clone(),
            id: None,
        })
        .collect();
}

pub fn render_status(response: &StatusResponse) -> String {
    let players = response.players.sample.as_ref().map_or_else(
        || "No players online".to_string(),
        |sample| {
            let entries: Vec<String> = sample
                .iter()
                .map(|player| format!("{} ({})", player.name, player.id))
                .collect();
            format!("{entries:?}")
        },
    );
    format!(
        "version: v{} (protocol {})\ndescription: \"{}\"\nplayers: {}/{} {players}",
        response.version.name,
        response.version.protocol,
        response.description,
        response.players.online,
        response.players.max,
    )
}

pub fn render_query(server: &JavaServer, response: &QueryResponse) -> String {
    let host_ip = response.raw.get("hostip").map_or(server.host.as_str(), String::as_str);
    let host_port = response
        .raw
        .get("hostport")
        .cloned()
        .unwrap_or_else(|| server.port.to_string());
    format!(
        "host: {host_ip}:{host_port}\nsoftware: v{} {}\nplugins: {:?}\nmotd: \"{}\"\nplayers: {}/{} {:?}",
        response.software.version,
        response.software.brand,
        response.software.plugins,
        response.motd,
        response.players.online,
        response.players.max,
        response.players.names,
    )
}

pub fn render_bedrock(response: &BedrockResponse) -> String {
    let mut out = format!(
        "version: {} v{} (protocol {})\nmotd: \"{}\"\nplayers: {}/{}\nping: {:.3}ms",
        response.edition,
        response.version.version,
        response.version.protocol,
        response.motd,
        response.players_online,
        response.players_max,
        response.latency,
    );
    if let Some(map) = &response.map {
        let _ = write!(out, "\nmap: {map}");
    }
    if let Some(gamemode) = &response.gamemode {
        let _ = write!(out, "\ngamemode: {gamemode}");
    }
    out
}

pub fn decode_favicon(favicon: &str) -> Result<Vec<u8>, Failure> {
    let data = favicon.strip_prefix(FAVICON_PREFIX).unwrap_or(favicon);
    Ok(STANDARD.decode(data.trim())?)
}

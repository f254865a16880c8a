//! crates/bitacora_core/src/advisory.rs
//!
//! The four AI advisory call sites. Each builds its prompt, asks the
//! [`AdvisoryService`] port and degrades to a fixed fallback text on any
//! failure: advice is informational and never blocks a workflow.

use crate::domain::{AppNotification, Expense, NotificationKind, Trip};
use crate::ports::{AdvisoryKind, AdvisoryPrompt, AdvisoryService};
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use tracing::error;

pub const TRIP_INSIGHTS_FALLBACK: &str = "No se pudieron cargar recomendaciones automáticas.";
pub const ADDRESS_FALLBACK: &str = "Error de conexión con el servicio de mapas.";
pub const ADDRESS_EMPTY_TEXT: &str = "La validación no devolvió texto.";
pub const FLEET_SUMMARY_FALLBACK: &str = "Análisis de inteligencia no disponible en este momento.";
pub const EXPENSE_AUDIT_FALLBACK: &str = "No se pudo realizar la auditoría en este momento.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressCheck {
    pub text: String,
    pub links: Vec<String>,
}

fn map_link_regex() -> &'static Regex {
    static LINKS: OnceLock<Regex> = OnceLock::new();
    LINKS.get_or_init(|| {
        Regex::new(r#"https?://(?:www\.)?(?:google\.[a-z.]+/maps|maps\.google\.[a-z.]+|maps\.app\.goo\.gl|goo\.gl/maps)[^\s)\]>"']*"#)
            .expect("static map link pattern")
    })
}

/// Map links mentioned in a free-form answer, in order, without duplicates.
pub fn extract_map_links(text: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for m in map_link_regex().find_iter(text) {
        let link = m.as_str().trim_end_matches(['.', ',', ';']).to_string();
        if !links.contains(&link) {
            links.push(link);
        }
    }
    links
}

//=========================================================================================
// Prompt Builders
//=========================================================================================

pub fn trip_insights_prompt(origin: &str, destination: &str) -> AdvisoryPrompt {
    AdvisoryPrompt {
        kind: AdvisoryKind::TripInsights,
        system_instruction: "Eres un analista de rutas logísticas de alto nivel con acceso a datos de telemetría y geografía."
            .to_string(),
        prompt: format!(
            "Analiza la ruta de carga pesada: Origen: {} -> Destino: {}. Proporciona 3 consejos técnicos sobre seguridad vial, optimización de combustible y posibles puntos críticos de descanso.",
            origin, destination
        ),
        temperature: Some(0.5),
    }
}

pub fn address_prompt(address: &str) -> AdvisoryPrompt {
    AdvisoryPrompt {
        kind: AdvisoryKind::AddressValidation,
        system_instruction: "Eres un oficial de cumplimiento logístico. Tu tarea es garantizar que las direcciones de carga sean válidas y seguras. Responde usando Markdown e incluye enlaces de Google Maps cuando identifiques la ubicación."
            .to_string(),
        prompt: format!(
            "Valida esta ubicación para maniobra de transporte pesado: {}. Confirma si la zona permite acceso a tractocamiones y si el código postal coincide con la colonia.",
            address
        ),
        temperature: None,
    }
}

/// Only the fields the summary needs are sent.
pub fn fleet_summary_prompt(
    trips: &[Trip],
    expenses: &[Expense],
    notifications: &[AppNotification],
) -> AdvisoryPrompt {
    let trips: Vec<_> = trips
        .iter()
        .map(|t| json!({ "id": t.id, "status": t.details.status, "client": t.details.client }))
        .collect();
    let expenses: Vec<_> = expenses
        .iter()
        .map(|e| json!({ "cat": e.category, "amount": e.amount, "date": e.date }))
        .collect();
    let alerts: Vec<_> = notifications
        .iter()
        .filter(|n| n.kind == NotificationKind::Alert)
        .map(|n| json!({ "msg": n.message, "type": n.kind }))
        .collect();

    AdvisoryPrompt {
        kind: AdvisoryKind::FleetSummary,
        system_instruction: "Analiza tendencias de gasto, eficiencia de rutas y niveles de riesgo en la flota. Sé directo y ejecutivo."
            .to_string(),
        prompt: format!(
            "Genera un reporte ejecutivo de la operación actual:\nVIAJES ACTIVOS: {}\nGASTOS RECIENTES: {}\nALERTAS DE OPERADORES: {}",
            serde_json::Value::from(trips),
            serde_json::Value::from(expenses),
            serde_json::Value::from(alerts)
        ),
        temperature: Some(0.2),
    }
}

pub fn expense_audit_prompt(expenses: &[Expense]) -> AdvisoryPrompt {
    let expenses: Vec<_> = expenses
        .iter()
        .map(|e| {
            json!({
                "amount": e.amount,
                "cat": e.category,
                "desc": e.description,
                "perf": e.performance,
            })
        })
        .collect();

    AdvisoryPrompt {
        kind: AdvisoryKind::ExpenseAudit,
        system_instruction: "Eres un auditor financiero especializado en logística. Detecta sobrecostos en combustible o mantenimientos excesivos."
            .to_string(),
        prompt: format!(
            "Analiza los siguientes gastos logísticos y detecta anomalías o áreas de ahorro: {}",
            serde_json::Value::from(expenses)
        ),
        temperature: Some(0.3),
    }
}

//=========================================================================================
// The Advisor
//=========================================================================================

/// Wraps the advisory port with the fallback policy. No retries.
#[derive(Clone)]
pub struct Advisor {
    service: Arc<dyn AdvisoryService>,
}

impl Advisor {
    pub fn new(service: Arc<dyn AdvisoryService>) -> Self {
        Self { service }
    }

    async fn generate_or(&self, prompt: AdvisoryPrompt, fallback: &str) -> String {
        match self.service.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => fallback.to_string(),
            Err(e) => {
                error!("Advisory {:?} failed: {}", prompt.kind, e);
                fallback.to_string()
            }
        }
    }

    pub async fn trip_insights(&self, origin: &str, destination: &str) -> String {
        self.generate_or(trip_insights_prompt(origin, destination), TRIP_INSIGHTS_FALLBACK)
            .await
    }

    pub async fn validate_address(&self, address: &str) -> AddressCheck {
        match self.service.generate(&address_prompt(address)).await {
            Ok(text) => {
                let links = extract_map_links(&text);
                let text = if text.trim().is_empty() {
                    ADDRESS_EMPTY_TEXT.to_string()
                } else {
                    text
                };
                AddressCheck { text, links }
            }
            Err(e) => {
                error!("Address validation failed: {}", e);
                AddressCheck {
                    text: ADDRESS_FALLBACK.to_string(),
                    links: Vec::new(),
                }
            }
        }
    }

    pub async fn fleet_summary(
        &self,
        trips: &[Trip],
        expenses: &[Expense],
        notifications: &[AppNotification],
    ) -> String {
        self.generate_or(
            fleet_summary_prompt(trips, expenses, notifications),
            FLEET_SUMMARY_FALLBACK,
        )
        .await
    }

    /// Nothing to audit yields the fallback without calling the service.
    pub async fn audit_expenses(&self, expenses: &[Expense]) -> String {
        if expenses.is_empty() {
            return EXPENSE_AUDIT_FALLBACK.to_string();
        }
        self.generate_or(expense_audit_prompt(expenses), EXPENSE_AUDIT_FALLBACK)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_map_links_once_each() {
        let text = "Zona apta. Ver https://maps.google.com/?q=25.67,-100.31. \
                    También (https://www.google.com/maps/place/Centro) y https://maps.google.com/?q=25.67,-100.31";
        assert_eq!(
            extract_map_links(text),
            vec![
                "https://maps.google.com/?q=25.67,-100.31".to_string(),
                "https://www.google.com/maps/place/Centro".to_string(),
            ]
        );
    }

    #[test]
    fn ignores_other_links() {
        assert!(extract_map_links("Consulta https://example.com/maps").is_empty());
    }

    #[test]
    fn prompts_carry_their_inputs() {
        let p = trip_insights_prompt("Monterrey", "Saltillo");
        assert_eq!(p.kind, AdvisoryKind::TripInsights);
        assert!(p.prompt.contains("Origen: Monterrey -> Destino: Saltillo"));

        let p = address_prompt("Av. Juárez 10, Centro, CP 64000");
        assert!(p.prompt.contains("CP 64000"));
    }
}

//! Canonical entry templates for workflow events.
//!
//! Each constructor fixes the component tag, marker, message wording and the
//! extra data keys for one kind of event, on top of [`LogEntry`].

use std::error::Error;
use std::path::Path;

use super::types::{ExtraMap, ExtraValue, FileOperation, Level, LogEntry};
use crate::extra;

pub const MARKER_STEP_STARTED: &str = "🚀 ";
pub const MARKER_STEP_COMPLETED: &str = "✅ ";
pub const MARKER_CODE: &str = "🔧 ";
pub const MARKER_API: &str = "🌐 ";
pub const MARKER_FILE: &str = "📁 ";
pub const MARKER_ERROR: &str = "❌ ";

/// Component tag used for entries the logger writes on its own behalf.
pub const SYSTEM_COMPONENT: &str = "SISTEMA";

/// Component tag for a workflow step.
pub fn step_component(step_number: u32) -> String {
    format!("ETAPA{step_number}")
}

pub fn step_started(
    session_id: &str,
    step_number: u32,
    step_name: &str,
    params: Option<ExtraMap>,
) -> LogEntry {
    LogEntry::new(
        session_id,
        Level::Info,
        step_component(step_number),
        format!("ETAPA {step_number} INICIADA: {step_name}"),
    )
    .with_marker(MARKER_STEP_STARTED)
    .with_extra(extra! {
        "etapa_numero" => step_number,
        "etapa_nome" => step_name,
        "parametros" => params.unwrap_or_default(),
        "status" => "iniciada",
    })
}

pub fn step_completed(
    session_id: &str,
    step_number: u32,
    step_name: &str,
    result: Option<ExtraMap>,
    elapsed_secs: f64,
) -> LogEntry {
    LogEntry::new(
        session_id,
        Level::Info,
        step_component(step_number),
        format!(
            "ETAPA {step_number} CONCLUÍDA: {step_name}{}",
            elapsed_suffix(elapsed_secs, " em ", "")
        ),
    )
    .with_marker(MARKER_STEP_COMPLETED)
    .with_elapsed(elapsed_secs)
    .with_extra(extra! {
        "etapa_numero" => step_number,
        "etapa_nome" => step_name,
        "resultado" => result.unwrap_or_default(),
        "tempo_execucao" => elapsed_secs,
        "status" => "concluida",
    })
}

pub fn code_executed(
    session_id: &str,
    component: &str,
    code: &str,
    result: Option<ExtraMap>,
) -> LogEntry {
    LogEntry::new(
        session_id,
        Level::Info,
        component,
        format!("Código executado em {component}"),
    )
    .with_marker(MARKER_CODE)
    .with_code(code)
    .with_extra(extra! {
        "resultado" => result.map(ExtraValue::Map),
        "codigo_tamanho" => code.chars().count(),
    })
}

pub fn code_failed(session_id: &str, component: &str, code: &str, error: &str) -> LogEntry {
    LogEntry::new(
        session_id,
        Level::Error,
        component,
        format!("Erro na execução de código em {component}: {error}"),
    )
    .with_marker(MARKER_ERROR)
    .with_code(code)
    .with_extra(extra! {
        "erro" => error,
        "codigo_tamanho" => code.chars().count(),
    })
}

pub fn api_call(
    session_id: &str,
    component: &str,
    api_name: &str,
    params: Option<ExtraMap>,
    elapsed_secs: f64,
    error: Option<&str>,
) -> LogEntry {
    let (level, marker, message) = match error {
        Some(err) => (
            Level::Error,
            MARKER_ERROR,
            format!("Erro na API {api_name}: {err}"),
        ),
        None => (
            Level::Info,
            MARKER_API,
            format!(
                "Chamada API {api_name}{}",
                elapsed_suffix(elapsed_secs, " (", ")")
            ),
        ),
    };

    LogEntry::new(session_id, level, component, message)
        .with_marker(marker)
        .with_elapsed(elapsed_secs)
        .with_extra(extra! {
            "api_name" => api_name,
            "parametros" => params.unwrap_or_default(),
            "tempo_resposta" => elapsed_secs,
            "erro" => error,
        })
}

pub fn file_processed(
    session_id: &str,
    component: &str,
    file: &Path,
    operation: FileOperation,
    details: Option<ExtraMap>,
) -> LogEntry {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    LogEntry::new(
        session_id,
        Level::Info,
        component,
        format!("{operation}: {name}"),
    )
    .with_marker(MARKER_FILE)
    .with_extra(extra! {
        "arquivo_path" => file.display().to_string(),
        "operacao" => operation.as_str(),
        "resultado" => details.unwrap_or_default(),
    })
}

/// Error entry carrying the whole `source()` chain and the `Debug` form of
/// the error as a verbatim block.
pub fn error(
    session_id: &str,
    component: &str,
    message: &str,
    error: &(dyn Error + 'static),
) -> LogEntry {
    let causes: Vec<String> = std::iter::successors(error.source(), |&e| e.source())
        .map(ToString::to_string)
        .collect();

    LogEntry::new(session_id, Level::Error, component, message)
        .with_marker(MARKER_ERROR)
        .with_code(format!("{error:#?}"))
        .with_extra(extra! {
            "erro" => error.to_string(),
            "causas" => causes,
        })
}

/// First entry written after the header of a new session.
pub fn session_started(session_id: &str) -> LogEntry {
    LogEntry::new(
        session_id,
        Level::Info,
        SYSTEM_COMPONENT,
        format!("Log iniciado para sessão {session_id}"),
    )
}

/// Non-zero elapsed times are rendered with two decimals between `open`
/// and `close`; zero renders nothing.
fn elapsed_suffix(secs: f64, open: &str, close: &str) -> String {
    if secs > 0.0 {
        format!("{open}{secs:.2}s{close}")
    } else {
        String::new()
    }
}

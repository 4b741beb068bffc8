//! Text rendering for session files.
//!
//! Pure functions: nothing here touches the registry or the filesystem.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Local};

use super::types::{ExtraMap, LogEntry, Metadata};

/// Width of the header/footer banners.
pub const BANNER_WIDTH: usize = 80;
/// Width of the separators around a code block.
pub const CODE_RULE_WIDTH: usize = 60;
/// Width of the separator closing an extra data block.
pub const EXTRA_RULE_WIDTH: usize = 40;
/// Padding applied to the level column.
pub const LEVEL_WIDTH: usize = 7;
/// Padding applied to the component column.
pub const COMPONENT_WIDTH: usize = 15;

pub const HEADER_TITLE: &str = "LOG DE EXECUÇÃO EM TEMPO REAL";
pub const FOOTER_TITLE: &str = "SESSÃO FINALIZADA";
pub const CODE_LABEL: &str = "CODE EXECUTED:";
pub const EXTRA_LABEL: &str = "EXTRA DATA:";

const ENTRY_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S%.3f";
const BANNER_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

fn rule(ch: char, width: usize) -> String {
    std::iter::repeat_n(ch, width).collect()
}

/// Render an entry as the block appended to its session file.
///
/// ```text
/// [14/03/2026 09:05:07.123] [INFO   ] [ETAPA1         ] 🚀 ETAPA 1 INICIADA: Coleta
/// ```
pub fn format_entry(entry: &LogEntry) -> String {
    let mut out = String::with_capacity(128);

    let _ = writeln!(
        out,
        "[{}] [{:<lw$}] [{:<cw$}] {}{}",
        entry.timestamp.format(ENTRY_TIME_FORMAT),
        entry.level.as_str(),
        entry.component,
        entry.marker.unwrap_or(""),
        entry.message,
        lw = LEVEL_WIDTH,
        cw = COMPONENT_WIDTH,
    );

    if let Some(code) = &entry.code {
        let code_rule = rule('─', CODE_RULE_WIDTH);
        let _ = writeln!(out);
        let _ = writeln!(out, "{code_rule}");
        let _ = writeln!(out, "{CODE_LABEL}");
        let _ = writeln!(out, "{code}");
        let _ = writeln!(out, "{code_rule}");
    }

    if let Some(extra) = &entry.extra {
        let _ = writeln!(out);
        let _ = writeln!(out, "{EXTRA_LABEL}");
        let _ = writeln!(out, "{}", render_extra(extra));
        let _ = writeln!(out, "{}", rule('─', EXTRA_RULE_WIDTH));
    }

    out.push('\n');
    out
}

/// Pretty JSON with two-space indentation, keys in insertion order.
pub fn render_extra(extra: &ExtraMap) -> String {
    serde_json::to_string_pretty(extra).unwrap_or_else(|e| format!("<unrenderable: {e}>"))
}

/// Render the block written once when a session is created.
pub fn format_header(
    session_id: &str,
    started_at: &DateTime<Local>,
    path: &Path,
    metadata: &Metadata,
) -> String {
    let banner = rule('=', BANNER_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "{banner}");
    let _ = writeln!(out, "{HEADER_TITLE:^BANNER_WIDTH$}");
    let _ = writeln!(out, "{banner}");
    let _ = writeln!(out, "SESSÃO: {session_id}");
    let _ = writeln!(out, "INICIADO EM: {}", started_at.format(BANNER_TIME_FORMAT));
    let _ = writeln!(out, "ARQUIVO: {}", path.display());
    let _ = writeln!(out, "{banner}");
    let _ = writeln!(out);

    if !metadata.is_empty() {
        let _ = writeln!(out, "INFORMAÇÕES DA SESSÃO:");
        for (key, value) in metadata {
            let _ = writeln!(out, "  {key}: {value}");
        }
        let _ = writeln!(out, "{banner}");
        let _ = writeln!(out);
    }

    out
}

/// Render the block written once when a session is finalized.
pub fn format_footer(
    session_id: &str,
    started_at: &DateTime<Local>,
    ended_at: &DateTime<Local>,
    entry_count: u64,
    summary: &ExtraMap,
) -> String {
    let banner = rule('=', BANNER_WIDTH);
    let duration = (*ended_at - *started_at).num_milliseconds().max(0) as f64 / 1000.0;
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out);
    let _ = writeln!(out, "{banner}");
    let _ = writeln!(out, "{FOOTER_TITLE:^BANNER_WIDTH$}");
    let _ = writeln!(out, "{banner}");
    let _ = writeln!(out, "SESSÃO: {session_id}");
    let _ = writeln!(out, "FINALIZADA EM: {}", ended_at.format(BANNER_TIME_FORMAT));
    let _ = writeln!(out, "DURAÇÃO TOTAL: {duration:.2} segundos");
    let _ = writeln!(out, "TOTAL DE LOGS: {entry_count}");
    let _ = writeln!(out, "{banner}");
    let _ = writeln!(out);

    if !summary.is_empty() {
        let _ = writeln!(out, "RESUMO DA SESSÃO:");
        for (key, value) in summary {
            let _ = writeln!(out, "  {key}: {value}");
        }
        let _ = writeln!(out, "{banner}");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::types::Level;
    use crate::{extra, metadata};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(h: u32, m: u32, s: u32, ms: i64) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, h, m, s).unwrap() + chrono::Duration::milliseconds(ms)
    }

    #[test]
    fn test_generic_line() {
        let entry = LogEntry::new("s1", Level::Info, "TESTE", "Testando sistema de log")
            .with_timestamp(at(9, 5, 7, 42));
        assert_eq!(
            format_entry(&entry),
            "[14/03/2026 09:05:07.042] [INFO   ] [TESTE          ] Testando sistema de log\n\n"
        );
    }

    #[test]
    fn test_long_component_not_truncated() {
        let entry = LogEntry::new("s1", Level::Warning, "A_VERY_LONG_COMPONENT", "m")
            .with_timestamp(at(0, 0, 0, 0));
        let text = format_entry(&entry);
        assert!(text.contains("[WARNING] [A_VERY_LONG_COMPONENT] m"));
    }

    #[test]
    fn test_marker_prefix() {
        let entry = LogEntry::new("s1", Level::Info, "ETAPA1", "ETAPA 1 INICIADA: Coleta")
            .with_marker("🚀 ")
            .with_timestamp(at(0, 0, 0, 0));
        assert!(format_entry(&entry).contains("] 🚀 ETAPA 1 INICIADA: Coleta\n"));
    }

    #[test]
    fn test_code_then_extra_blocks() {
        let entry = LogEntry::new("s1", Level::Info, "TESTE", "run")
            .with_timestamp(at(9, 5, 7, 0))
            .with_code("print('Hello World')\nresult = 2 + 2")
            .with_extra(extra! { "resultado" => "4", "codigo_tamanho" => 33 });
        let code_rule = "─".repeat(60);
        let extra_rule = "─".repeat(40);
        let expected = format!(
            "[14/03/2026 09:05:07.000] [INFO   ] [TESTE          ] run\n\
             \n\
             {code_rule}\n\
             CODE EXECUTED:\n\
             print('Hello World')\n\
             result = 2 + 2\n\
             {code_rule}\n\
             \n\
             EXTRA DATA:\n\
             {{\n  \"resultado\": \"4\",\n  \"codigo_tamanho\": 33\n}}\n\
             {extra_rule}\n\
             \n"
        );
        assert_eq!(format_entry(&entry), expected);
    }

    #[test]
    fn test_extra_nested_and_unicode() {
        let params = extra! { "max" => 50, "query" => "análise de mercado" };
        let rendered = render_extra(&extra! { "parametros" => params });
        assert!(rendered.contains("\"max\": 50"));
        assert!(rendered.contains("análise de mercado"));
    }

    #[test]
    fn test_header() {
        let meta = metadata! { "tipo" => "test", "usuario" => "dev" };
        let header = format_header("s1", &at(9, 5, 7, 0), Path::new("/logs/log_s1.txt"), &meta);
        assert!(header.starts_with("\n================"));
        assert!(header.contains(HEADER_TITLE));
        assert!(header.contains("SESSÃO: s1\n"));
        assert!(header.contains("INICIADO EM: 14/03/2026 09:05:07\n"));
        assert!(header.contains("ARQUIVO: /logs/log_s1.txt\n"));
        assert!(header.contains("INFORMAÇÕES DA SESSÃO:\n  tipo: test\n  usuario: dev\n"));
    }

    #[test]
    fn test_header_without_metadata() {
        let header = format_header("s1", &at(9, 5, 7, 0), Path::new("/l"), &Metadata::new());
        assert!(!header.contains("INFORMAÇÕES DA SESSÃO"));
    }

    #[test]
    fn test_footer() {
        let summary = extra! { "status" => "SUCESSO", "etapas" => 3 };
        let footer = format_footer("s1", &at(9, 0, 0, 0), &at(9, 0, 12, 340), 7, &summary);
        assert!(footer.contains(FOOTER_TITLE));
        assert!(footer.contains("SESSÃO: s1\n"));
        assert!(footer.contains("FINALIZADA EM: 14/03/2026 09:00:12\n"));
        assert!(footer.contains("DURAÇÃO TOTAL: 12.34 segundos\n"));
        assert!(footer.contains("TOTAL DE LOGS: 7\n"));
        assert!(footer.contains("RESUMO DA SESSÃO:\n  status: SUCESSO\n  etapas: 3\n"));
        assert!(footer.ends_with(&format!("{}\n", "=".repeat(80))));
    }
}

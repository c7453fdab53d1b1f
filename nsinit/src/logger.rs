use env_logger::fmt::Color;
use log::LevelFilter;
use std::{env, io::Write};

/// Install the logger. `RUST_LOG` takes precedence over `level`.
pub fn init(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter_module("nsinit", level);
    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.format(|buf, record| {
        let mut style = buf.style();

        let timestamp = buf.timestamp_millis();
        let level = buf.default_styled_level(record.metadata().level());

        if let Some(module_path) = record
            .module_path()
            .and_then(|module_path| module_path.find("::").map(|p| &module_path[p + 2..]))
        {
            style.set_color(hashed_color(module_path));
            writeln!(
                buf,
                "{}: {:<5}: {} {}",
                timestamp,
                level,
                style.value(module_path),
                record.args(),
            )
        } else {
            writeln!(buf, "{}: {:<5}: {}", timestamp, level, record.args())
        }
    });

    builder.init()
}

/// Stable color per module. Skips colors that are hard to read on dark terminals.
fn hashed_color(module: &str) -> Color {
    Color::Ansi256(match module.bytes().fold(42u8, |c, x| c ^ x) {
        c @ 0..=1 => c + 2,
        c @ 16..=21 => c + 6,
        c @ 52..=55 | c @ 126..=129 => c + 4,
        c @ 163..=165 | c @ 200..=201 => c + 3,
        c @ 207 => c + 1,
        c @ 232..=240 => c + 9,
        c => c,
    })
}

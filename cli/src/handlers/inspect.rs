use std::path::PathBuf;

use anyhow::Context;
use console::Style;
use sensorium::evaluation::EvaluationTable;

const PREVIEW_VALUES: usize = 4;

fn preview<T: std::fmt::Debug>(values: &[T]) -> String {
    let shown: Vec<String> =
        values.iter().take(PREVIEW_VALUES).map(|value| format!("{value:?}")).collect();
    if values.len() > PREVIEW_VALUES {
        format!("[{}, ...]", shown.join(", "))
    } else {
        format!("[{}]", shown.join(", "))
    }
}

pub fn handle_inspect(
    path: PathBuf,
    rows: usize,
) -> anyhow::Result<()> {
    let table = EvaluationTable::read(&path).with_context(|| format!("Failed to read {:?}", path))?;

    let style_bold = Style::new().bold();
    let style_dim = Style::new().dim();
    println!(
        "{}: {} rows, {} neurons, {} column",
        style_bold.apply_to(path.display()),
        table.len(),
        table.neurons(),
        table.value_column()
    );
    for row in table.rows().iter().take(rows) {
        println!(
            "{:>8} {:>8} {} {}",
            row.trial_index,
            row.image_id,
            preview(&row.values),
            style_dim.apply_to(preview(&row.neuron_ids))
        );
    }
    if table.len() > rows {
        println!("{}", style_dim.apply_to(format!("... {} more", table.len() - rows)));
    }
    Ok(())
}

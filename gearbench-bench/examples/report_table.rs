use std::collections::HashMap;
use std::error::Error;
use std::fs;

use gearbench::{Phase, ResultTable};

fn load(path: &str) -> Option<ResultTable> {
    let data = fs::read_to_string(path).ok()?;
    ResultTable::from_json(&data).ok()
}

type Key = (String, String, String);

/// Median of each phase and of the total per extent/precision/variant.
fn medians(table: &ResultTable) -> HashMap<Key, (Vec<f64>, f64)> {
    let mut grouped: HashMap<Key, Vec<&gearbench::BenchRecord>> = HashMap::new();
    for r in &table.results {
        grouped
            .entry((r.extent.clone(), r.precision.clone(), r.variant.clone()))
            .or_default()
            .push(r);
    }
    grouped
        .into_iter()
        .map(|(key, records)| {
            let phases = Phase::ALL
                .iter()
                .map(|&p| median(records.iter().filter_map(|r| r.phase_ms(p)).collect()))
                .collect();
            let total = median(records.iter().map(|r| r.phases_ms.values().sum::<f64>()).collect());
            (key, (phases, total))
        })
        .collect()
}

/// Middle value; mean of the two middle values for an even count.
fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let latest = load("../benchmarks/latest.json").ok_or("no ../benchmarks/latest.json")?;
    let previous = load("../benchmarks/previous.json").map(|t| medians(&t));

    let date = chrono::DateTime::parse_from_rfc3339(&latest.env.date)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| latest.env.date.clone());

    let mut table = String::new();
    table.push_str(&format!(
        "Last run: {} on {} ({})\n\n",
        date, latest.env.device, latest.env.os
    ));
    table.push_str("| Extent | Precision | Variant |");
    for phase in Phase::ALL {
        table.push_str(&format!(" {phase} |"));
    }
    table.push_str(" Total | vs previous |\n");
    table.push_str(&"| --- ".repeat(Phase::ALL.len() + 5));
    table.push_str("|\n");

    let current = medians(&latest);
    let mut keys: Vec<&Key> = current.keys().collect();
    keys.sort();
    for key in keys {
        let (phases, total) = &current[key];
        table.push_str(&format!("| {} | {} | {} |", key.0, key.1, key.2));
        for ms in phases {
            table.push_str(&format!(" {ms:.3} ms |"));
        }
        let change = previous
            .as_ref()
            .and_then(|p| p.get(key))
            .map(|(_, prev)| format!("{:+.1}%", (prev - total) / prev * 100.0))
            .unwrap_or_else(|| "n/a".into());
        table.push_str(&format!(" {total:.3} ms | {change} |\n"));
    }
    update_readme(&table)?;
    print!("{table}");
    Ok(())
}

fn update_readme(table: &str) -> Result<(), Box<dyn Error>> {
    let path = "README.md";
    let Ok(content) = fs::read_to_string(path) else {
        return Ok(());
    };
    let start = "<!-- BENCH_START -->";
    let end = "<!-- BENCH_END -->";
    if let (Some(s), Some(e)) = (content.find(start), content.find(end)) {
        let mut new_content = String::new();
        new_content.push_str(&content[..s + start.len()]);
        new_content.push('\n');
        new_content.push_str(table);
        new_content.push_str(&content[e..]);
        fs::write(path, new_content)?;
    }
    Ok(())
}

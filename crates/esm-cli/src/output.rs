use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    print_row(headers.iter().map(|h| h.to_string()), &widths);
    print_row(widths.iter().map(|&w| "-".repeat(w)), &widths);
    for row in rows {
        print_row(row.into_iter(), &widths);
    }
}

fn print_row(cells: impl Iterator<Item = String>, widths: &[usize]) {
    let cells: Vec<String> = cells
        .enumerate()
        .map(|(i, cell)| {
            let w = widths.get(i).copied().unwrap_or(0);
            format!("{:width$}", cell, width = w)
        })
        .collect();
    println!("{}", cells.join("  ").trim_end());
}

/// Shorten a hex checksum for table output.
pub fn short_checksum(checksum: &str) -> String {
    checksum.chars().take(12).collect()
}

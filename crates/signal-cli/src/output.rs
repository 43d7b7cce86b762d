use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Compact form for event streams: one JSON document per line.
pub fn print_json_line<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Left-aligned columns separated by two spaces, with a dashed rule under
/// the header. Cells beyond the header count are dropped.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(col, h)| {
            rows.iter()
                .filter_map(|r| r.get(col))
                .map(|c| c.chars().count())
                .fold(h.chars().count(), usize::max)
        })
        .collect();

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let mut out = line(headers.to_vec());
    out += &line(rule.iter().map(String::as_str).collect());
    for row in rows {
        out += &line(row.iter().map(String::as_str).collect());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_to_widest_cell() {
        let rows = vec![
            vec!["car".to_string(), "91%".to_string(), "yes".to_string()],
            vec!["motorbike".to_string(), "7%".to_string(), String::new()],
        ];
        let out = render_table(&["LABEL", "CONFIDENCE", "VEHICLE"], &rows);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "LABEL      CONFIDENCE  VEHICLE");
        assert_eq!(lines[1], "---------  ----------  -------");
        assert_eq!(lines[2], "car        91%         yes");
        assert_eq!(lines[3], "motorbike  7%");
    }

    #[test]
    fn short_rows_are_allowed() {
        let out = render_table(&["A", "B"], &[vec!["x".to_string()]]);
        assert_eq!(out.lines().nth(2), Some("x"));
    }
}

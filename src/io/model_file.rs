use std::io::Write;

use crate::errors::LancError;
use crate::model::params::ModelParams;

/// One non-blank, non-comment line from a model file, tokenized on
/// whitespace.
fn data_lines(text: &str) -> Vec<Vec<&str>> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.split_whitespace().collect())
        .collect()
}

fn parse_floats(tokens: &[&str], context: &str) -> Result<Vec<f64>, LancError> {
    tokens
        .iter()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| LancError::malformed(format!("{}: expected a float, got {:?}", context, t)))
        })
        .collect()
}

/// Reads the model format from spec.md §6: ancestry names, panel names,
/// `T`, `mu`, `A` rows of `theta`, `A` rows of `epsilon`, then `rho`.
pub fn read_model_file(
    text: &str,
) -> Result<(Vec<String>, Vec<String>, ModelParams), LancError> {
    let lines = data_lines(text);
    let mut it = lines.into_iter();

    let ancestry_names: Vec<String> = it
        .next()
        .ok_or_else(|| LancError::malformed("model file missing ancestry-name line"))?
        .into_iter()
        .map(String::from)
        .collect();
    let a = ancestry_names.len();

    let panel_names: Vec<String> = it
        .next()
        .ok_or_else(|| LancError::malformed("model file missing panel-name line"))?
        .into_iter()
        .map(String::from)
        .collect();
    let p = panel_names.len();

    let t_line = it
        .next()
        .ok_or_else(|| LancError::malformed("model file missing T line"))?;
    if t_line.len() != 1 {
        return Err(LancError::malformed("model file T line must have exactly one value"));
    }
    let t: f64 = t_line[0]
        .parse()
        .map_err(|_| LancError::malformed("model file T value is not numeric"))?;

    let mu_line = it
        .next()
        .ok_or_else(|| LancError::malformed("model file missing mu line"))?;
    if mu_line.len() != a {
        return Err(LancError::inconsistent("model file mu line length does not match ancestry count"));
    }
    let mu = parse_floats(&mu_line, "mu line")?;

    let mut theta = Vec::with_capacity(a);
    for i in 0..a {
        let row = it
            .next()
            .ok_or_else(|| LancError::malformed(format!("model file missing theta row {}", i)))?;
        if row.len() != p {
            return Err(LancError::inconsistent(format!(
                "model file theta row {} length does not match panel count",
                i
            )));
        }
        theta.push(parse_floats(&row, "theta row")?);
    }

    let mut epsilon = Vec::with_capacity(a);
    for i in 0..a {
        let row = it
            .next()
            .ok_or_else(|| LancError::malformed(format!("model file missing epsilon row {}", i)))?;
        if row.len() != p {
            return Err(LancError::inconsistent(format!(
                "model file epsilon row {} length does not match panel count",
                i
            )));
        }
        epsilon.push(parse_floats(&row, "epsilon row")?);
    }

    let rho_line = it
        .next()
        .ok_or_else(|| LancError::malformed("model file missing rho line"))?;
    if rho_line.len() != a {
        return Err(LancError::inconsistent("model file rho line length does not match ancestry count"));
    }
    let rho = parse_floats(&rho_line, "rho line")?;

    Ok((
        ancestry_names,
        panel_names,
        ModelParams {
            t,
            mu,
            theta,
            epsilon,
            rho,
        },
    ))
}

/// Writes a model file in the same format, with `T` and `mu` set to the
/// values actually used (estimated by EM or supplied fixed).
pub fn write_model_file<W: Write>(
    mut out: W,
    ancestry_names: &[String],
    panel_names: &[String],
    params: &ModelParams,
) -> Result<(), LancError> {
    let io_err = |e: std::io::Error| LancError::Io(e.to_string());
    writeln!(out, "{}", ancestry_names.join(" ")).map_err(io_err)?;
    writeln!(out, "{}", panel_names.join(" ")).map_err(io_err)?;
    writeln!(out, "{}", params.t.round() as i64).map_err(io_err)?;
    writeln!(
        out,
        "{}",
        params.mu.iter().map(|v| format!("{:.6}", v)).collect::<Vec<_>>().join(" ")
    )
    .map_err(io_err)?;
    for row in &params.theta {
        writeln!(out, "{}", row.iter().map(|v| format!("{:.6}", v)).collect::<Vec<_>>().join(" "))
            .map_err(io_err)?;
    }
    for row in &params.epsilon {
        writeln!(out, "{}", row.iter().map(|v| format!("{:.6}", v)).collect::<Vec<_>>().join(" "))
            .map_err(io_err)?;
    }
    writeln!(
        out,
        "{}",
        params.rho.iter().map(|v| format!("{:.6}", v)).collect::<Vec<_>>().join(" ")
    )
    .map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_text() {
        let ancestries = vec!["EUR".to_string(), "AFR".to_string()];
        let panels = vec!["P0".to_string(), "P1".to_string()];
        let params = ModelParams {
            t: 12.0,
            mu: vec![0.6, 0.4],
            theta: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            epsilon: vec![vec![0.01, 0.01], vec![0.01, 0.01]],
            rho: vec![5.0, 5.0],
        };
        let mut buf = Vec::new();
        write_model_file(&mut buf, &ancestries, &panels, &params).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let (names, panel_names, parsed) = read_model_file(&text).unwrap();
        assert_eq!(names, ancestries);
        assert_eq!(panel_names, panels);
        assert_eq!(parsed.t, 12.0);
        assert!((parsed.mu[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn rejects_mismatched_row_lengths() {
        let text = "A B\nP0 P1\n10\n0.5 0.5\n1.0 0.0 0.0\n0.0 1.0\n0.01 0.01\n0.01 0.01\n5.0 5.0\n";
        assert!(read_model_file(text).is_err());
    }
}

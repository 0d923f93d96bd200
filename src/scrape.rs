//! Parsers for the three public reference pages.
//!
//! The pages are matched with targeted patterns rather than a DOM: each
//! parser looks for one known structure and fails with
//! [`EtlError::Parse`] when it is missing.

use regex::Regex;

use crate::error::EtlError;

pub const DANE_BASE: &str = "https://www.dane.gov.co";
const POVERTY_IFRAME_MARKER: &str = "gra-PMDepartamental";

#[derive(Debug, Clone, PartialEq)]
pub struct HdiRow {
    pub entity: String,
    pub hdi: f64,
    pub population: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PovertyRow {
    pub department: String,
    pub poverty_2023: f64,
    pub poverty_2024: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MunicipalityLink {
    pub department: String,
    pub municipality: String,
    pub url: String,
}

fn pattern(source: &str) -> Result<Regex, EtlError> {
    Regex::new(source).map_err(|err| EtlError::parse("pattern", err.to_string()))
}

/// Rows of the first `wikitable` with exactly three data cells.
pub fn parse_hdi_table(html: &str) -> Result<Vec<HdiRow>, EtlError> {
    let table_re = pattern(r#"(?is)<table[^>]*class\s*=\s*["'][^"']*\bwikitable\b[^"']*["'][^>]*>(.*?)</table>"#)?;
    let row_re = pattern(r"(?is)<tr[^>]*>(.*?)</tr>")?;
    let cell_re = pattern(r"(?is)<td[^>]*>(.*?)</td>")?;

    let table = table_re
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| EtlError::parse("HDI page", "no wikitable found"))?
        .as_str();

    let mut rows = Vec::new();
    for row in row_re.captures_iter(table) {
        let cells: Vec<String> = cell_re
            .captures_iter(&row[1])
            .map(|c| text_content(&c[1], ""))
            .collect();
        if cells.len() != 3 {
            continue;
        }
        let hdi = cells[1].replace(',', ".").parse::<f64>().map_err(|_| {
            EtlError::parse("HDI table", format!("'{}' is not a number ({})", cells[1], cells[0]))
        })?;
        let population_text: String = cells[2]
            .chars()
            .filter(|c| *c != '\u{a0}' && *c != ' ')
            .collect();
        let population = population_text.parse::<i64>().map_err(|_| {
            EtlError::parse("HDI table", format!("'{}' is not a population ({})", cells[2], cells[0]))
        })?;
        rows.push(HdiRow {
            entity: cells[0].clone(),
            hdi,
            population,
        });
    }
    if rows.is_empty() {
        return Err(EtlError::parse("HDI table", "no three-cell rows"));
    }
    Ok(rows)
}

/// Absolute URL of the departmental poverty visualization iframe.
pub fn find_poverty_iframe(html: &str) -> Result<String, EtlError> {
    let iframe_re = pattern(r#"(?is)<iframe[^>]*\bsrc\s*=\s*["']([^"']+)["']"#)?;
    let src = iframe_re
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .find(|src| src.contains(POVERTY_IFRAME_MARKER))
        .ok_or_else(|| EtlError::parse("DANE page", "poverty iframe not found"))?;
    Ok(resolve_url(DANE_BASE, &decode_entities(&src)))
}

pub fn resolve_url(base: &str, src: &str) -> String {
    let base = base.trim_end_matches('/');
    if src.starts_with("http://") || src.starts_with("https://") {
        src.to_string()
    } else if let Some(rest) = src.strip_prefix("//") {
        format!("https://{rest}")
    } else if src.starts_with('/') {
        format!("{base}{src}")
    } else {
        format!("{base}/{src}")
    }
}

/// Department labels and the 2023/2024 series from the chart script.
pub fn parse_poverty_script(html: &str) -> Result<Vec<PovertyRow>, EtlError> {
    let script_re = pattern(r"(?is)<script[^>]*>(.*?)</script>")?;
    let script = script_re
        .captures_iter(html)
        .map(|c| c.get(1).map_or("", |m| m.as_str()))
        .find(|body| body.contains("labels"))
        .ok_or_else(|| EtlError::parse("DANE iframe", "no script with labels"))?;

    let labels = capture_list(script, r"(?s)labels:\s*\[(.*?)\]", "labels")?;
    let series = |year: &str| -> Result<Vec<f64>, EtlError> {
        let raw = capture_list(
            script,
            &format!(r"(?s)label:\s*'{year}'.*?data:\s*\[(.*?)\]"),
            &format!("{year} series"),
        )?;
        split_list(&raw)
            .iter()
            .map(|item| {
                item.parse::<f64>().map_err(|_| {
                    EtlError::parse("DANE iframe", format!("'{item}' in {year} series is not a number"))
                })
            })
            .collect()
    };
    let departments: Vec<String> = split_list(&labels)
        .into_iter()
        .map(|item| unquote(&item))
        .collect();
    let previous = series("2023")?;
    let current = series("2024")?;
    if previous.len() != departments.len() || current.len() != departments.len() {
        return Err(EtlError::parse(
            "DANE iframe",
            format!(
                "{} label(s) but {} / {} value(s)",
                departments.len(),
                previous.len(),
                current.len()
            ),
        ));
    }
    Ok(departments
        .into_iter()
        .zip(previous.into_iter().zip(current))
        .map(|(department, (poverty_2023, poverty_2024))| PovertyRow {
            department,
            poverty_2023,
            poverty_2024,
        })
        .collect())
}

fn capture_list(script: &str, source: &str, what: &str) -> Result<String, EtlError> {
    pattern(source)?
        .captures(script)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| EtlError::parse("DANE iframe", format!("{what} not found")))
}

/// Splits a JavaScript array body on top-level commas, respecting quotes.
fn split_list(raw: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in raw.chars() {
        match (quote, ch) {
            (None, '\'' | '"') => {
                quote = Some(ch);
                current.push(ch);
            }
            (Some(q), c) if c == q => {
                quote = None;
                current.push(ch);
            }
            (None, ',') => {
                items.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        items.push(current.trim().to_string());
    }
    items.retain(|item| !item.is_empty());
    items
}

fn unquote(item: &str) -> String {
    let trimmed = item.trim();
    for q in ['\'', '"'] {
        if let Some(inner) = trimmed.strip_prefix(q).and_then(|s| s.strip_suffix(q)) {
            return inner.to_string();
        }
    }
    trimmed.to_string()
}

/// Every municipality link grouped under its department slide.
pub fn parse_municipality_index(html: &str) -> Result<Vec<MunicipalityLink>, EtlError> {
    let slide_re = pattern(r#"(?is)<div[^>]*class\s*=\s*["'][^"']*\bdepartamento_slide\b[^"']*["'][^>]*>"#)?;
    let heading_re = pattern(r"(?is)<h3[^>]*>(.*?)</h3>")?;
    let list_re = pattern(r#"(?is)<ul[^>]*class\s*=\s*["'][^"']*\bmunicipiosDepartamento\b[^"']*["'][^>]*>(.*?)</ul>"#)?;
    let link_re = pattern(r#"(?is)<li[^>]*>.*?<a[^>]*\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#)?;

    let starts: Vec<usize> = slide_re.find_iter(html).map(|m| m.start()).collect();
    if starts.is_empty() {
        return Err(EtlError::parse("municipality index", "no department slides"));
    }

    let mut links = Vec::new();
    for (idx, start) in starts.iter().enumerate() {
        let end = starts.get(idx + 1).copied().unwrap_or(html.len());
        let slide = &html[*start..end];
        let department = heading_re
            .captures(slide)
            .map(|c| text_content(&c[1], ""))
            .ok_or_else(|| EtlError::parse("municipality index", "department slide without h3"))?;
        for list in list_re.captures_iter(slide) {
            for link in link_re.captures_iter(&list[1]) {
                links.push(MunicipalityLink {
                    department: department.clone(),
                    municipality: text_content(&link[2], ""),
                    url: decode_entities(&link[1]),
                });
            }
        }
    }
    Ok(links)
}

/// Population text from a municipality detail page, without the
/// `habitantes` label.
pub fn parse_municipality_population(html: &str) -> Result<String, EtlError> {
    let block_re = pattern(r#"(?is)<div[^>]*class\s*=\s*["']col-6 col-md-4 py-4["'][^>]*>(.*?)</div>"#)?;
    block_re
        .captures_iter(html)
        .map(|c| text_content(&c[1], " "))
        .find(|text| text.to_lowercase().contains("habitantes"))
        .map(|text| text.replace("habitantes", "").trim().to_string())
        .ok_or_else(|| EtlError::parse("municipality page", "no population block"))
}

/// Tag-stripped, entity-decoded, trimmed text. `separator` replaces each tag.
fn text_content(fragment: &str, separator: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push_str(separator);
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    let decoded = decode_entities(&out);
    if separator.is_empty() {
        decoded.trim().to_string()
    } else {
        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match tail.find(';').filter(|end| *end <= 10) {
            Some(end) => match decode_entity(&tail[1..end]) {
                Some(ch) => {
                    out.push(ch);
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = &tail[1..];
                }
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(code) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(code, 16).ok().and_then(char::from_u32);
    }
    if let Some(code) = name.strip_prefix('#') {
        return code.parse::<u32>().ok().and_then(char::from_u32);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "aacute" => 'á',
        "eacute" => 'é',
        "iacute" => 'í',
        "oacute" => 'ó',
        "uacute" => 'ú',
        "ntilde" => 'ñ',
        "uuml" => 'ü',
        "Aacute" => 'Á',
        "Eacute" => 'É',
        "Iacute" => 'Í',
        "Oacute" => 'Ó',
        "Uacute" => 'Ú',
        "Ntilde" => 'Ñ',
        "Uuml" => 'Ü',
        _ => return None,
    })
}

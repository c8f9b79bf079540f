//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings.
/// Cuts on a char boundary, so emoji sequences never split mid-codepoint.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while end > 0 && !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

/// Treat blank strings as absent. Used for env values and optional model fields.
pub fn non_blank(s: Option<String>) -> Option<String> {
  s.and_then(|v| {
    let t = v.trim();
    if t.is_empty() { None } else { Some(t.to_string()) }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_every_occurrence() {
    let out = fill_template("{a} and {a}, then {b}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and x, then y");
  }

  #[test]
  fn fill_template_leaves_unknown_placeholders() {
    assert_eq!(fill_template("level {level}", &[("count", "5")]), "level {level}");
  }

  #[test]
  fn trunc_for_log_respects_char_boundaries() {
    let s = "🐱🏃🏠🐱🏃🏠";
    let out = trunc_for_log(s, 5);
    assert!(out.starts_with("🐱"));
    assert!(out.ends_with(&format!("({} bytes total)", s.len())));
    assert_eq!(trunc_for_log("short", 10), "short");
  }

  #[test]
  fn non_blank_filters_whitespace() {
    assert_eq!(non_blank(Some("  ".into())), None);
    assert_eq!(non_blank(None), None);
    assert_eq!(non_blank(Some(" key ".into())), Some("key".into()));
  }
}

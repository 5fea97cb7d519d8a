//! Canonical measurement units.

/// Maps a raw unit token to its canonical full-word form.
///
/// Matching ignores case, surrounding whitespace and a trailing period.
/// Plural markers survive (`tsps` becomes `teaspoons`). Unknown units are
/// returned exactly as given.
pub fn normalize_unit(raw: &str) -> String {
    let token = raw.trim().to_lowercase();
    let token = token.strip_suffix('.').unwrap_or(&token).trim_end();
    canonical_unit(token).map_or_else(|| raw.to_string(), str::to_string)
}

fn canonical_unit(token: &str) -> Option<&'static str> {
    let canonical = match token {
        "tsp" | "ts" | "tspn" | "teaspoon" | "tea spoon" => "teaspoon",
        "tsps" | "tspns" | "teaspoons" | "tea spoons" => "teaspoons",
        "tbsp" | "tbs" | "tbl" | "tblsp" | "tbspn" | "tablespoon" | "table spoon" => "tablespoon",
        "tbsps" | "tbls" | "tblsps" | "tbspns" | "tablespoons" | "table spoons" => "tablespoons",
        "cup" | "c" => "cup",
        "cups" => "cups",
        "g" | "gr" | "gm" | "gram" | "gramme" => "gram",
        "gs" | "grs" | "gms" | "grams" | "grammes" => "grams",
        "ml" | "milliliter" | "millilitre" => "milliliter",
        "mls" | "milliliters" | "millilitres" => "milliliters",
        "pc" | "pce" | "piece" => "piece",
        "pcs" | "pces" | "pieces" => "pieces",
        "pinch" => "pinch",
        "pinches" => "pinches",
        _ => return None,
    };
    Some(canonical)
}

/// Folds a canonical plural onto its singular so `gram` and `grams` merge.
pub fn unit_family(unit: &str) -> String {
    let canonical = normalize_unit(unit).to_lowercase();
    match canonical.as_str() {
        "teaspoons" => "teaspoon".to_string(),
        "tablespoons" => "tablespoon".to_string(),
        "cups" => "cup".to_string(),
        "grams" => "gram".to_string(),
        "milliliters" => "milliliter".to_string(),
        "pieces" => "piece".to_string(),
        "pinches" => "pinch".to_string(),
        _ => canonical.trim().to_string(),
    }
}

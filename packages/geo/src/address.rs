//! Address formatting for Nominatim reverse responses.
//!
//! The display heuristic is tuned for Swedish addresses: street first when
//! there is one, the suburb for the three big cities where it carries real
//! information, and the municipality as a fallback detail when the result
//! would otherwise be too short.

use serde::Deserialize;

/// Localities large enough that the suburb is worth showing.
const WIDE_LOCALITIES: &[&str] = &["Malmö", "Tätort Göteborg", "Stockholm"];

/// Top-level Nominatim reverse response. Everything is optional in the
/// wire format; absent fields deserialize to empty strings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Reverse {
    pub display_name: String,
    pub lat: String,
    pub lon: String,
    pub error: String,
    pub address: Address,
}

/// The `address` object of a reverse response.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Address {
    pub isolated_dwelling: String,
    pub neighbourhood: String,
    pub quarter: String,
    pub house_number: String,
    pub road: String,
    pub pedestrian: String,
    pub footway: String,
    pub cycleway: String,
    pub highway: String,
    pub path: String,
    pub suburb: String,
    pub city: String,
    pub town: String,
    pub village: String,
    pub hamlet: String,
    pub municipality: String,
    pub county: String,
    pub country: String,
    pub country_code: String,
    pub state: String,
    pub state_district: String,
    pub postcode: String,
}

/// Display-relevant fields as a statically declared (name, accessor) list.
/// The field set is fixed, so no introspection is needed; administrative
/// fields (house number, county, country, postcode and friends) are left
/// out on purpose.
const DISPLAY_FIELDS: &[(&str, fn(&Address) -> &str)] = &[
    ("isolated_dwelling", |a| &a.isolated_dwelling),
    ("neighbourhood", |a| &a.neighbourhood),
    ("quarter", |a| &a.quarter),
    ("road", |a| &a.road),
    ("pedestrian", |a| &a.pedestrian),
    ("footway", |a| &a.footway),
    ("cycleway", |a| &a.cycleway),
    ("highway", |a| &a.highway),
    ("path", |a| &a.path),
    ("suburb", |a| &a.suburb),
    ("city", |a| &a.city),
    ("town", |a| &a.town),
    ("village", |a| &a.village),
    ("hamlet", |a| &a.hamlet),
    ("municipality", |a| &a.municipality),
];

impl Address {
    /// First non-empty street-like field, in priority order.
    fn street(&self) -> &str {
        [
            &self.road,
            &self.pedestrian,
            &self.path,
            &self.cycleway,
            &self.footway,
            &self.highway,
            &self.neighbourhood,
            &self.quarter,
            &self.isolated_dwelling,
        ]
        .into_iter()
        .find(|s| !s.is_empty())
        .map_or("", String::as_str)
    }

    /// First non-empty locality-like field, in priority order.
    fn locality(&self) -> &str {
        [&self.city, &self.town, &self.village, &self.hamlet]
            .into_iter()
            .find(|s| !s.is_empty())
            .map_or("", String::as_str)
    }

    /// True when the service returned an address object with nothing in it.
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Non-empty display-relevant fields whose values are not in `shown`,
    /// as `name:value` pairs. Diagnostic aid for responses that format
    /// shorter than expected.
    #[must_use]
    pub fn remainder(&self, shown: &[&str]) -> String {
        DISPLAY_FIELDS
            .iter()
            .filter_map(|(name, field)| {
                let value = field(self);
                (!value.is_empty() && !shown.contains(&value)).then(|| format!("{name}:{value}"))
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Formats the compact display string.
    ///
    /// Returns `"??"` when the address is entirely empty and `"?"` when no
    /// display-relevant field survives selection.
    #[must_use]
    pub fn display_string(&self) -> String {
        if self.is_empty() {
            return "??".to_string();
        }

        let mut items: Vec<&str> = Vec::new();

        let mut suburb = "";
        let mut municipality = "";

        let street = self.street();
        if street.is_empty() {
            suburb = &self.suburb;
        } else {
            items.push(street);
        }

        let locality = self.locality();
        if WIDE_LOCALITIES.contains(&locality) {
            suburb = &self.suburb;
        } else if locality.is_empty() {
            // details to an empty locality
            suburb = &self.suburb;
            municipality = &self.municipality;
        }

        if !suburb.is_empty() {
            items.push(suburb);
        }
        if !locality.is_empty() {
            items.push(if locality == "Tätort Göteborg" {
                "Göteborg"
            } else {
                locality
            });
        }

        // detail to a short address
        if items.len() < 2 {
            municipality = &self.municipality;
        }
        if !municipality.is_empty() {
            items.push(municipality);
        }

        if items.is_empty() {
            return "?".to_string();
        }

        if log::log_enabled!(log::Level::Trace) {
            let leftovers = self.remainder(&items);
            if !leftovers.is_empty() {
                log::trace!("address fields not shown: {leftovers}");
            }
        }

        let mut s = items.join(", ");

        if !self.country_code.eq_ignore_ascii_case("se") {
            let code = if self.country_code.is_empty() {
                "??".to_string()
            } else {
                self.country_code.to_uppercase()
            };
            s.push_str(&format!(" ({code})"));
        }

        s
    }
}

/// Parses a raw reverse response body and formats its compact display
/// string.
///
/// # Errors
///
/// Returns the underlying `serde_json` error when the payload is not valid
/// JSON.
pub fn format_address(raw: &[u8]) -> Result<String, serde_json::Error> {
    let root: Reverse = serde_json::from_slice(raw)?;
    Ok(root.address.display_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> Address {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn street_and_wide_city_include_suburb() {
        let a = parse(serde_json::json!({
            "road": "Storgatan",
            "city": "Stockholm",
            "suburb": "Södermalm",
        }));
        assert_eq!(a.display_string(), "Storgatan, Södermalm, Stockholm");
    }

    #[test]
    fn no_street_uses_suburb_before_locality() {
        let a = parse(serde_json::json!({
            "city": "Lund",
            "suburb": "Centrum",
        }));
        // Two items already, so the municipality fallback does not trigger.
        assert_eq!(a.display_string(), "Centrum, Lund");
    }

    #[test]
    fn entirely_empty_address() {
        let a = Address::default();
        assert_eq!(a.display_string(), "??");
    }

    #[test]
    fn no_display_fields_is_single_question_mark() {
        // Administrative fields only: nothing displayable survives, and the
        // country suffix is not appended in this case.
        let a = parse(serde_json::json!({
            "postcode": "21119",
            "country_code": "de",
        }));
        assert_eq!(a.display_string(), "?");
    }

    #[test]
    fn street_priority_order() {
        let a = parse(serde_json::json!({
            "pedestrian": "Gågatan",
            "road": "Storgatan",
            "city": "Lund",
        }));
        assert_eq!(a.display_string(), "Storgatan, Lund");

        let a = parse(serde_json::json!({
            "quarter": "Gamla staden",
            "neighbourhood": "Väster",
            "city": "Lund",
        }));
        assert_eq!(a.display_string(), "Väster, Lund");
    }

    #[test]
    fn locality_priority_order() {
        let a = parse(serde_json::json!({
            "road": "Byvägen",
            "village": "Dalby",
            "town": "Eslöv",
        }));
        assert_eq!(a.display_string(), "Byvägen, Eslöv");
    }

    #[test]
    fn tatort_goteborg_displays_as_goteborg() {
        let a = parse(serde_json::json!({
            "road": "Avenyn",
            "city": "Tätort Göteborg",
            "suburb": "Lorensberg",
        }));
        assert_eq!(a.display_string(), "Avenyn, Lorensberg, Göteborg");
    }

    #[test]
    fn municipality_fills_out_short_results() {
        let a = parse(serde_json::json!({
            "road": "Skogsvägen",
            "municipality": "Höörs kommun",
        }));
        assert_eq!(a.display_string(), "Skogsvägen, Höörs kommun");
    }

    #[test]
    fn municipality_may_repeat_locality() {
        // No deduplication; accepted behavior.
        let a = parse(serde_json::json!({
            "city": "Lomma",
            "municipality": "Lomma",
        }));
        assert_eq!(a.display_string(), "Lomma, Lomma");
    }

    #[test]
    fn empty_locality_pulls_in_suburb_and_municipality() {
        let a = parse(serde_json::json!({
            "suburb": "Önnerup",
            "municipality": "Lomma kommun",
        }));
        assert_eq!(a.display_string(), "Önnerup, Lomma kommun");
    }

    #[test]
    fn foreign_country_code_is_appended_uppercased() {
        let a = parse(serde_json::json!({
            "road": "Strandvejen",
            "city": "København",
            "country_code": "dk",
        }));
        assert_eq!(a.display_string(), "Strandvejen, København (DK)");
    }

    #[test]
    fn missing_country_code_is_flagged() {
        let a = parse(serde_json::json!({
            "road": "Storgatan",
            "city": "Lund",
        }));
        assert_eq!(a.display_string(), "Storgatan, Lund (??)");
    }

    #[test]
    fn swedish_country_code_has_no_suffix() {
        for code in ["se", "SE"] {
            let a = parse(serde_json::json!({
                "road": "Storgatan",
                "city": "Lund",
                "country_code": code,
            }));
            assert_eq!(a.display_string(), "Storgatan, Lund");
        }
    }

    #[test]
    fn formatting_is_deterministic() {
        let raw = serde_json::json!({
            "display_name": "Storgatan, Lund, Sverige",
            "address": {
                "road": "Storgatan",
                "city": "Lund",
                "country_code": "se",
            }
        })
        .to_string();
        let first = format_address(raw.as_bytes()).unwrap();
        let second = format_address(raw.as_bytes()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "Storgatan, Lund");
    }

    #[test]
    fn remainder_lists_fields_not_shown() {
        let a = parse(serde_json::json!({
            "road": "Storgatan",
            "hamlet": "Flädie",
            "city": "Lund",
        }));
        assert_eq!(a.remainder(&["Storgatan", "Lund"]), "hamlet:Flädie");
    }

    #[test]
    fn format_address_rejects_garbage() {
        assert!(format_address(b"not json").is_err());
    }
}

//! Domain value types shared by the dispatcher and the upstream adapter.
//!
//! These types only exist once their contents have been checked, so the
//! adapter never has to re-validate what it is asked to query.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Chemical element symbols, H through Og.
const ELEMENTS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Largest chemical system accepted for phase-diagram queries.
///
/// Every sub-system is queried, so the upstream request grows as `2^n - 1`.
pub const MAX_CHEMSYS_ELEMENTS: usize = 6;

fn material_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(mp|mvc)-\d+$").expect("static pattern is valid"))
}

fn chemsys_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Z][a-z]?(-[A-Z][a-z]?)*$").expect("static pattern is valid")
    })
}

/// Returns `true` if `symbol` names a chemical element.
#[must_use]
pub fn is_element(symbol: &str) -> bool {
    ELEMENTS.contains(&symbol)
}

/// A Materials Project identifier such as `mp-149`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialId(String);

impl MaterialId {
    /// Parses an identifier, accepting `mp-<n>` and `mvc-<n>`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the identifier is malformed.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if material_id_pattern().is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(format!(
                "'{raw}' is not a Materials Project ID (expected e.g. 'mp-149')"
            ))
        }
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chemical system such as `Fe-Li-O`, stored with elements sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChemicalSystem(Vec<String>);

impl ChemicalSystem {
    /// Parses a dash-separated chemical system.
    ///
    /// Element order in the input does not matter; `Li-Fe-O` and `O-Fe-Li`
    /// name the same system.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the system is malformed,
    /// names an unknown or repeated element, or is too large.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if !chemsys_pattern().is_match(trimmed) {
            return Err(format!(
                "'{raw}' is not a chemical system (expected e.g. 'Li-Fe-O')"
            ));
        }

        let mut elements: Vec<String> = Vec::new();
        for symbol in trimmed.split('-') {
            if !is_element(symbol) {
                return Err(format!("'{symbol}' is not a chemical element"));
            }
            if elements.iter().any(|e| e == symbol) {
                return Err(format!("element '{symbol}' appears more than once"));
            }
            elements.push(symbol.to_string());
        }

        if elements.len() > MAX_CHEMSYS_ELEMENTS {
            return Err(format!(
                "chemical systems are limited to {MAX_CHEMSYS_ELEMENTS} elements"
            ));
        }

        elements.sort();
        Ok(Self(elements))
    }

    /// Returns the elements in sorted order.
    #[must_use]
    pub fn elements(&self) -> &[String] {
        &self.0
    }

    /// Returns every non-empty sub-system, each in canonical form.
    ///
    /// Unaries come first, then binaries, and so on; within a size the order
    /// is lexicographic.
    #[must_use]
    pub fn subsystems(&self) -> Vec<String> {
        let n = self.0.len();
        let mut subsets: Vec<Vec<&str>> = (1_u32..(1 << n))
            .map(|mask| {
                self.0
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, e)| e.as_str())
                    .collect()
            })
            .collect();
        subsets.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        subsets.into_iter().map(|s| s.join("-")).collect()
    }
}

impl fmt::Display for ChemicalSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("-"))
    }
}

/// Filters for a materials summary search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    /// Elements every returned material must contain.
    pub elements: Vec<String>,
    /// Lower band-gap bound in eV.
    pub band_gap_min: Option<f64>,
    /// Upper band-gap bound in eV.
    pub band_gap_max: Option<f64>,
    /// Restrict to (or exclude) thermodynamically stable materials.
    pub is_stable: Option<bool>,
    /// Upper bound on energy above the convex hull in eV/atom.
    pub energy_above_hull_max: Option<f64>,
    /// Number of records to request.
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_table_is_complete() {
        assert!(is_element("H"));
        assert!(is_element("Og"));
        assert!(is_element("Mn"));
        assert!(!is_element("Xx"));
        assert!(!is_element("mn"));
    }

    #[test]
    fn material_id_accepts_known_prefixes() {
        assert_eq!(MaterialId::parse("mp-149").unwrap().as_str(), "mp-149");
        assert_eq!(MaterialId::parse(" mvc-12 ").unwrap().as_str(), "mvc-12");
    }

    #[test]
    fn material_id_rejects_garbage() {
        assert!(MaterialId::parse("149").is_err());
        assert!(MaterialId::parse("mp-").is_err());
        assert!(MaterialId::parse("mp-14a").is_err());
        assert!(MaterialId::parse("").is_err());
    }

    #[test]
    fn chemsys_is_sorted() {
        let sys = ChemicalSystem::parse("Li-Fe-O").unwrap();
        assert_eq!(sys.elements(), ["Fe", "Li", "O"]);
        assert_eq!(sys.to_string(), "Fe-Li-O");
    }

    #[test]
    fn chemsys_rejects_bad_input() {
        assert!(ChemicalSystem::parse("li-fe").is_err());
        assert!(ChemicalSystem::parse("Li--Fe").is_err());
        assert!(ChemicalSystem::parse("Li-Xx").is_err());
        assert!(ChemicalSystem::parse("Li-Li").is_err());
        assert!(ChemicalSystem::parse("H-He-Li-Be-B-C-N").is_err());
    }

    #[test]
    fn subsystems_of_ternary() {
        let sys = ChemicalSystem::parse("O-Li-Fe").unwrap();
        assert_eq!(
            sys.subsystems(),
            ["Fe", "Li", "O", "Fe-Li", "Fe-O", "Li-O", "Fe-Li-O"]
        );
    }

    #[test]
    fn subsystems_of_unary() {
        let sys = ChemicalSystem::parse("Si").unwrap();
        assert_eq!(sys.subsystems(), ["Si"]);
    }
}

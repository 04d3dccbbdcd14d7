//! Reference data for the 27 Brazilian federative units

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StateProfile {
    pub code: &'static str,
    pub population: u64,
    pub gdp_per_capita: f64,
    /// Market tier, 1 = most developed
    pub tier: u8,
    pub urban_rate: f64,
}

const fn profile(code: &'static str, population: u64, gdp_per_capita: f64, tier: u8, urban_rate: f64) -> StateProfile {
    StateProfile {
        code,
        population,
        gdp_per_capita,
        tier,
        urban_rate,
    }
}

pub const STATE_PROFILES: [StateProfile; 27] = [
    profile("SP", 46_649_132, 56_956.0, 1, 0.96),
    profile("RJ", 17_463_349, 51_929.0, 1, 0.97),
    profile("MG", 21_411_923, 35_219.0, 1, 0.85),
    profile("BA", 15_203_934, 22_045.0, 2, 0.73),
    profile("PR", 11_597_484, 42_791.0, 2, 0.85),
    profile("RS", 11_466_630, 45_180.0, 2, 0.85),
    profile("PE", 9_674_793, 21_077.0, 2, 0.80),
    profile("CE", 9_240_580, 18_320.0, 2, 0.75),
    profile("PA", 8_777_124, 17_179.0, 3, 0.68),
    profile("SC", 7_338_473, 46_016.0, 2, 0.84),
    profile("GO", 7_206_589, 30_544.0, 2, 0.90),
    profile("MA", 7_153_262, 14_748.0, 3, 0.64),
    profile("PB", 4_059_905, 17_687.0, 3, 0.75),
    profile("AM", 4_269_995, 23_894.0, 3, 0.79),
    profile("ES", 4_108_508, 38_177.0, 2, 0.83),
    profile("MT", 3_567_234, 49_265.0, 2, 0.82),
    profile("AL", 3_365_351, 16_463.0, 3, 0.73),
    profile("PI", 3_289_290, 14_454.0, 3, 0.66),
    profile("DF", 3_094_325, 85_830.0, 1, 0.97),
    profile("MS", 2_839_188, 39_265.0, 2, 0.86),
    profile("RN", 3_560_903, 18_690.0, 3, 0.77),
    profile("RO", 1_815_278, 26_157.0, 3, 0.74),
    profile("AC", 906_876, 18_327.0, 3, 0.73),
    profile("AP", 877_613, 19_952.0, 3, 0.90),
    profile("SE", 2_338_474, 22_942.0, 3, 0.74),
    profile("TO", 1_607_363, 22_555.0, 3, 0.79),
    profile("RR", 652_713, 22_896.0, 3, 0.76),
];

/// Case-insensitive lookup by two-letter state code
pub fn state_profile(code: &str) -> Option<&'static StateProfile> {
    let code = code.trim();
    STATE_PROFILES
        .iter()
        .find(|p| p.code.eq_ignore_ascii_case(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_all_states_once() {
        let mut codes: Vec<&str> = STATE_PROFILES.iter().map(|p| p.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 27);
    }

    #[test]
    fn test_lookup() {
        let sp = state_profile("sp").unwrap();
        assert_eq!(sp.tier, 1);
        assert!(state_profile("XX").is_none());
    }
}

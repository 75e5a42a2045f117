use serde::Serialize;

use crate::hours::HoursSnapshot;
use crate::models::text_enum;

text_enum!(
    Certification, "certification" {
        Private => "private" | "ppl",
        Instrument => "instrument" | "ir",
        Commercial => "commercial" | "cpl",
    }
);

impl Certification {
    pub fn title(&self) -> &'static str {
        match self {
            Certification::Private => "Private Pilot (61.109)",
            Certification::Instrument => "Instrument Rating (61.65)",
            Certification::Commercial => "Commercial Pilot (61.129)",
        }
    }

    pub fn requirements(&self) -> &'static [Requirement] {
        match self {
            Certification::Private => PRIVATE,
            Certification::Instrument => INSTRUMENT,
            Certification::Commercial => COMMERCIAL,
        }
    }

    /// The requirement the timeline is projected against.
    pub fn key_requirement(&self) -> &'static Requirement {
        &self.requirements()[0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Hours,
    Ops,
    Flight,
}

impl Unit {
    pub fn suffix(&self) -> &'static str {
        match self {
            Unit::Hours => "h",
            Unit::Ops => "ops",
            Unit::Flight => "flight",
        }
    }
}

/// Where a requirement's current value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HourSource {
    Field(&'static str),
    MinOf(&'static str, &'static str),
    SumOf(&'static str, &'static str),
}

impl HourSource {
    pub fn resolve(&self, snapshot: &HoursSnapshot) -> f64 {
        match *self {
            HourSource::Field(key) => snapshot.get(key),
            HourSource::MinOf(a, b) => snapshot.get(a).min(snapshot.get(b)),
            HourSource::SumOf(a, b) => snapshot.get(a) + snapshot.get(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Requirement {
    pub label: &'static str,
    pub required: f64,
    pub unit: Unit,
    pub source: HourSource,
}

const fn req(label: &'static str, required: f64, unit: Unit, source: HourSource) -> Requirement {
    Requirement {
        label,
        required,
        unit,
        source,
    }
}

use HourSource::{Field, MinOf, SumOf};
use Unit::{Flight, Hours, Ops};

// First row of each table is the key requirement.

const PRIVATE: &[Requirement] = &[
    req("Total flight time", 40.0, Hours, Field("total")),
    req("Dual instruction received", 20.0, Hours, Field("dual_received")),
    req("Solo flight time", 10.0, Hours, Field("solo")),
    req("Cross-country PIC", 5.0, Hours, MinOf("cross_country", "pic")),
    req("Night training", 3.0, Hours, Field("night")),
    req("Cross-country dual", 3.0, Hours, Field("dual_xc")),
    req("Instrument training", 3.0, Hours, Field("instrument_dual_airplane")),
    req("Solo long cross-country (150 nm)", 1.0, Flight, Field("private_long_xc")),
    req("Solo towered takeoffs and landings", 3.0, Ops, Field("private_towered_ops")),
];

const INSTRUMENT: &[Requirement] = &[
    req("Instrument time", 40.0, Hours, Field("instrument_total")),
    req("Cross-country PIC", 50.0, Hours, Field("pic_xc")),
    req("Instrument dual in airplane", 15.0, Hours, Field("instrument_dual_airplane")),
    req("Instrument XC (250 nm)", 1.0, Flight, Field("ir_250nm_xc")),
    req("Recent instrument training", 3.0, Hours, Field("recent_instrument")),
];

const COMMERCIAL: &[Requirement] = &[
    req("Total flight time", 250.0, Hours, Field("total")),
    req("PIC time", 100.0, Hours, Field("pic")),
    req("Cross-country PIC", 50.0, Hours, Field("pic_xc")),
    req("Cross-country time", 50.0, Hours, Field("cross_country")),
    req("Instrument training", 10.0, Hours, Field("cpl_sim_instrument_training")),
    req("Complex or TAA training", 10.0, Hours, SumOf("complex", "taa")),
    req("Day XC (2 h, 100 nm)", 1.0, Flight, Field("cpl_2hr_day_xc")),
    req("Night XC (2 h, 100 nm)", 1.0, Flight, Field("cpl_2hr_night_xc")),
    req("Checkride prep (last 2 months)", 3.0, Hours, Field("cpl_checkride_prep_recent")),
    req("Solo single-engine", 10.0, Hours, Field("cpl_solo_se")),
    req("Solo XC (300 nm)", 1.0, Flight, Field("cpl_300nm_xc")),
    req("Night VFR", 5.0, Hours, Field("cpl_night_vfr")),
    req("Night takeoffs (towered)", 10.0, Ops, Field("cpl_night_takeoffs_towered")),
    req("Night landings (towered)", 10.0, Ops, Field("cpl_night_landings_towered")),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, f64)]) -> HoursSnapshot {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_aliases() {
        assert_eq!("PPL".parse::<Certification>().unwrap(), Certification::Private);
        assert_eq!("ir".parse::<Certification>().unwrap(), Certification::Instrument);
        assert_eq!("cpl".parse::<Certification>().unwrap(), Certification::Commercial);
        assert!("atp".parse::<Certification>().is_err());
    }

    #[test]
    fn test_key_requirements() {
        let private = Certification::Private.key_requirement();
        assert_eq!(private.source, Field("total"));
        assert_eq!(private.required, 40.0);
        assert_eq!(
            Certification::Instrument.key_requirement().source,
            Field("instrument_total")
        );
        assert_eq!(Certification::Commercial.key_requirement().required, 250.0);
    }

    #[test]
    fn test_tables_have_positive_requirements() {
        for cert in Certification::ALL {
            assert!(!cert.requirements().is_empty());
            for r in cert.requirements() {
                assert!(r.required > 0.0, "{} {}", cert, r.label);
            }
        }
    }

    #[test]
    fn test_derived_sources() {
        let snap = snapshot(&[("cross_country", 6.0), ("pic", 5.0), ("complex", 4.0), ("taa", 3.5)]);
        assert_eq!(MinOf("cross_country", "pic").resolve(&snap), 5.0);
        assert_eq!(SumOf("complex", "taa").resolve(&snap), 7.5);
        assert_eq!(Field("night").resolve(&snap), 0.0);
    }
}

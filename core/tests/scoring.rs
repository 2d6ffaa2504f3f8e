mod common;

use common::{account, config, rep, scenario};
use territory_core::{
    config::{ContinuityParams, EngineKind},
    event::WarningLog,
    model::{RawAccount, RawRep},
    normalizer::normalize,
    regions::RegionMatch,
    scoring::{continuity_score, team_alignment_score, ScoreMatrix},
};

fn book_and_scores() -> (territory_core::model::Book, ScoreMatrix) {
    let input = scenario(
        vec![
            RawAccount {
                days_since_owner_change: Some(730),
                owner_count: Some(1),
                team_tier: Some("Enterprise".into()),
                ..account("A1", 500_000.0, "East", Some("R1"))
            },
            RawAccount {
                team_tier: Some("SMB".into()),
                ..account("A2", 1_000.0, "UKI", None)
            },
            account("A3", f64::NAN, "", Some("R2")),
        ],
        vec![
            RawRep { team_tier: Some("Enterprise".into()), ..rep("R1", "East") },
            RawRep { team_tier: Some("SMB".into()), ..rep("R2", "West") },
            rep("R3", "DACH"),
            RawRep { is_backfill_source: true, ..rep("R4", "ANZ") },
        ],
    );
    let config = config(EngineKind::Waterfall);
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config, &mut warnings);
    let scores = ScoreMatrix::build(&book, &config);
    (book, scores)
}

#[test]
fn every_score_is_in_unit_range() {
    let (_, scores) = book_and_scores();
    for s in scores.iter() {
        for v in [s.continuity, s.geography, s.team_alignment, s.weighted] {
            assert!((0.0..=1.0).contains(&v), "score {v} out of range in {s:?}");
        }
    }
}

#[test]
fn long_tenured_high_value_owner_scores_full_continuity() {
    let (book, scores) = book_and_scores();
    let a1 = book.account_idx("A1").expect("A1");
    let r1 = book.rep_idx("R1").expect("R1");
    let r2 = book.rep_idx("R2").expect("R2");

    // base .1 + tenure .3 + stability .2·(1 − 1/5) + value .4 = .96
    assert!((scores.get(a1, r1).continuity - 0.96).abs() < 1e-9);
    assert!((scores.get(a1, r2).continuity - 0.1).abs() < 1e-9);
}

#[test]
fn departing_owner_scores_zero_continuity() {
    let input = scenario(
        vec![account("A1", 10.0, "East", Some("R9"))],
        vec![RawRep { is_backfill_source: true, ..rep("R9", "East") }],
    );
    let config = config(EngineKind::Waterfall);
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config, &mut warnings);

    assert_eq!(continuity_score(&book, 0, 0, &ContinuityParams::default()), 0.0);
}

#[test]
fn geography_follows_the_region_tree() {
    let (book, scores) = book_and_scores();
    let a1 = book.account_idx("A1").expect("A1");
    let a3 = book.account_idx("A3").expect("A3");
    let rep = |id: &str| book.rep_idx(id).expect("rep");

    assert_eq!(scores.region_match(a1, rep("R1")), RegionMatch::Exact);
    assert_eq!(scores.region_match(a1, rep("R2")), RegionMatch::Sibling);
    assert_eq!(scores.region_match(a1, rep("R3")), RegionMatch::Global);
    assert_eq!(scores.region_match(a3, rep("R1")), RegionMatch::Unknown);
    assert_eq!(scores.get(a1, rep("R1")).geography, 1.0);
    assert_eq!(scores.get(a3, rep("R1")).geography, 0.5);
}

#[test]
fn team_alignment_penalises_reaching_down() {
    let config = config(EngineKind::Waterfall);
    let team = &config.scoring.team;
    let tiers = &config.tiers;

    assert_eq!(team_alignment_score(tiers, Some("SMB"), Some("SMB"), team), 1.0);
    let up = team_alignment_score(tiers, Some("Enterprise"), Some("MidMarket"), team);
    let down = team_alignment_score(tiers, Some("MidMarket"), Some("Enterprise"), team);
    assert!((up - 0.6).abs() < 1e-9);
    assert!((down - 0.45).abs() < 1e-9);
    assert_eq!(team_alignment_score(tiers, Some("ENT"), Some("Enterprise"), team), 1.0);
    assert_eq!(team_alignment_score(tiers, None, Some("SMB"), team), 0.5);
}

#[test]
fn weighted_score_combines_enabled_objectives() {
    let (book, scores) = book_and_scores();
    let a2 = book.account_idx("A2").expect("A2");
    let r2 = book.rep_idx("R2").expect("R2");
    let s = scores.get(a2, r2);

    // Unowned: continuity base .1; UKI vs West: global .15; SMB/SMB: 1.0.
    let expected = 0.5 * 0.1 + 0.3 * 0.15 + 0.2 * 1.0;
    assert!((s.weighted - expected).abs() < 1e-9);
}

//! End-to-end scenarios spanning event building, folding, hierarchy
//! construction and matching.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::event::{pdg, Event, Origin, View};
use crate::fold::FoldingParameters;
use crate::hierarchy::{McHierarchy, RecoHierarchy, ReconstructabilityCriteria};
use crate::matching::{MatchInfo, QualityCuts};

fn loose() -> ReconstructabilityCriteria {
    ReconstructabilityCriteria {
        min_hits: 1,
        min_hits_for_good_view: 1,
        min_good_views: 1,
        remove_neutrons: false,
    }
}

fn attach_hits(event: &mut Event, particle: usize, n: usize) -> Vec<usize> {
    let hits: Vec<usize> = (0..n).map(|i| event.add_hit(View::ALL[i % 3], 1.0)).collect();
    event.attach_mc_hits(particle, &hits).unwrap();
    hits
}

/// Grow a random truth tree under a neutrino and return the particle ids.
fn random_tree(event: &mut Event, rng: &mut StdRng, depth: usize) -> Vec<usize> {
    let nu = event.add_mc_particle(pdg::NU_MU, 2.5, Origin::BeamNeutrino, None).unwrap();
    let mut particles = vec![nu];
    let mut frontier = vec![nu];
    for _ in 0..depth {
        let mut next = Vec::new();
        for &parent in &frontier {
            for _ in 0..rng.gen_range(1..=3usize) {
                let code = if rng.gen_bool(0.3) { pdg::PHOTON } else { pdg::PI_PLUS };
                let child = event
                    .add_mc_particle(code, rng.gen_range(0.1..2.0), Origin::BeamNeutrino, Some(parent))
                    .unwrap();
                attach_hits(event, child, rng.gen_range(3..9));
                particles.push(child);
                next.push(child);
            }
        }
        frontier = next;
    }
    particles
}

#[test]
fn test_empty_event_produces_empty_match() {
    let event = Event::new();
    let mut mc = McHierarchy::new(&event);
    mc.fill(&[], &[], &FoldingParameters::none());
    let mut reco = RecoHierarchy::new(&event);
    reco.fill(&[], &[], &FoldingParameters::none());

    assert!(mc.is_empty());
    assert!(reco.is_empty());

    let info = MatchInfo::match_hierarchies(&mc, &reco, QualityCuts::default());
    assert_eq!(info.n_mc_nodes(), 0);
    assert!(info.matches().is_empty());
    assert!(info.unmatched_mc().is_empty());
    assert!(info.unmatched_reco().is_empty());
}

#[test]
fn test_classification_partitions_every_mc_node() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut event = Event::new();
    let particles = random_tree(&mut event, &mut rng, 3);

    // Reconstruct roughly half the truth particles, each with a slice of
    // that particle's hits plus occasional noise.
    let mut pfos = Vec::new();
    for &p in &particles[1..] {
        if rng.gen_bool(0.5) {
            continue;
        }
        let truth_hits = event.hits_of_mc(p).to_vec();
        let take = rng.gen_range(1..=truth_hits.len());
        let mut reco_hits: Vec<usize> = truth_hits[..take].to_vec();
        if rng.gen_bool(0.3) {
            reco_hits.push(event.add_hit(View::U, 1.0));
        }
        let pfo = event.add_pfo(pdg::PI_PLUS, None).unwrap();
        event.attach_pfo_hits(pfo, &reco_hits).unwrap();
        pfos.push(pfo);
    }

    let all_hits: Vec<usize> = event.hit_ids().collect();
    let mut mc = McHierarchy::with_criteria(&event, loose());
    mc.fill(&particles, &all_hits, &FoldingParameters::none());
    let mut reco = RecoHierarchy::new(&event);
    reco.fill(&pfos, &all_hits, &FoldingParameters::none());

    let info = MatchInfo::match_hierarchies(&mc, &reco, QualityCuts::default());
    let classified = info.good_matches().count()
        + info.above_threshold_matches().count()
        + info.sub_threshold_matches().count()
        + info.unmatched_mc().len();
    assert_eq!(classified, info.n_mc_nodes());
    assert!(info.n_mc_nodes() > 0);

    // Reco side partitions too: every node is a candidate somewhere or
    // reported unmatched, never both.
    let claimed: std::collections::HashSet<usize> = info
        .matches()
        .iter()
        .flat_map(|m| m.reco_matches().iter().copied())
        .collect();
    for &r in info.unmatched_reco() {
        assert!(!claimed.contains(&r));
    }
    assert_eq!(claimed.len() + info.unmatched_reco().len(), reco.len());
}

#[test]
fn test_purity_and_completeness_stay_in_unit_interval() {
    let mut rng = StdRng::seed_from_u64(29);
    let mut event = Event::new();
    let particles = random_tree(&mut event, &mut rng, 2);

    let mut pfos = Vec::new();
    for &p in &particles[1..] {
        let truth_hits = event.hits_of_mc(p).to_vec();
        let take = rng.gen_range(1..=truth_hits.len());
        let pfo = event.add_pfo(pdg::PI_PLUS, None).unwrap();
        event.attach_pfo_hits(pfo, &truth_hits[..take]).unwrap();
        pfos.push(pfo);
    }

    let all_hits: Vec<usize> = event.hit_ids().collect();
    let mut mc = McHierarchy::with_criteria(&event, loose());
    mc.fill(&particles, &all_hits, &FoldingParameters::none());
    let mut reco = RecoHierarchy::new(&event);
    reco.fill(&pfos, &all_hits, &FoldingParameters::none());

    let info = MatchInfo::match_hierarchies(&mc, &reco, QualityCuts::default());
    for matches in info.matches() {
        for &reco_node in matches.reco_matches() {
            for weighted in [false, true] {
                let p = info.purity(matches.mc_node(), reco_node, weighted).unwrap();
                let c = info.completeness(matches.mc_node(), reco_node, weighted).unwrap();
                assert!(p > 0.0 && p <= 1.0, "purity {p} out of range");
                assert!(c > 0.0 && c <= 1.0, "completeness {c} out of range");
            }
        }
    }
}

#[test]
fn test_tier_folding_coarsens_monotonically() {
    let mut rng = StdRng::seed_from_u64(43);
    for seed in 0..5u64 {
        let mut rng_tree = StdRng::seed_from_u64(seed.wrapping_mul(977).wrapping_add(rng.gen::<u64>() % 7));
        let mut event = Event::new();
        let particles = random_tree(&mut event, &mut rng_tree, 4);
        let all_hits: Vec<usize> = event.hit_ids().collect();

        let mut previous = None;
        for tier in 1..=4usize {
            let mut mc = McHierarchy::with_criteria(&event, loose());
            mc.fill(&particles, &all_hits, &FoldingParameters::to_tier(tier).unwrap());
            if let Some(previous) = previous {
                assert!(
                    previous <= mc.len(),
                    "folding to tier {} produced fewer nodes than tier {}",
                    tier,
                    tier - 1
                );
            }
            previous = Some(mc.len());
        }
    }
}

#[test]
fn test_folded_hierarchies_still_match() {
    let mut event = Event::new();
    let nu = event.add_mc_particle(pdg::NU_MU, 2.0, Origin::BeamNeutrino, None).unwrap();
    let mu = event.add_mc_particle(pdg::MUON, 1.0, Origin::BeamNeutrino, Some(nu)).unwrap();
    let gamma = event.add_mc_particle(pdg::PHOTON, 0.3, Origin::BeamNeutrino, Some(mu)).unwrap();
    let electron = event.add_mc_particle(pdg::ELECTRON, 0.1, Origin::BeamNeutrino, Some(gamma)).unwrap();
    let mu_hits = attach_hits(&mut event, mu, 12);
    let gamma_hits = attach_hits(&mut event, gamma, 6);
    let electron_hits = attach_hits(&mut event, electron, 4);

    // Reco found one muon track and one merged shower.
    let track = event.add_pfo(pdg::MUON, None).unwrap();
    event.attach_pfo_hits(track, &mu_hits).unwrap();
    let shower = event.add_pfo(pdg::ELECTRON, Some(track)).unwrap();
    let shower_hits: Vec<usize> = gamma_hits.iter().chain(&electron_hits).copied().collect();
    event.attach_pfo_hits(shower, &shower_hits).unwrap();

    let all_hits: Vec<usize> = event.hit_ids().collect();
    let params = FoldingParameters::to_leading_showers();

    let mut mc = McHierarchy::with_criteria(&event, loose());
    mc.fill(&[nu, mu, gamma, electron], &all_hits, &params);
    let mut reco = RecoHierarchy::new(&event);
    reco.fill(&[track, shower], &all_hits, &params);

    // Truth side folds the photon and its electron into one shower node.
    assert_eq!(mc.len(), 2);
    assert_eq!(reco.len(), 2);

    let info = MatchInfo::match_hierarchies(&mc, &reco, QualityCuts::default());
    assert_eq!(info.good_matches().count(), 2);
    assert!(info.unmatched_mc().is_empty());
    assert!(info.unmatched_reco().is_empty());
}

#[test]
fn test_configuration_round_trips_through_json() {
    let params = FoldingParameters::dynamic(0.995).unwrap();
    let text = serde_json::to_string(&params).unwrap();
    let decoded: FoldingParameters = serde_json::from_str(&text).unwrap();
    assert_eq!(params, decoded);

    let cuts = QualityCuts::new(0.8, 0.7).unwrap();
    let text = serde_json::to_string(&cuts).unwrap();
    let decoded: QualityCuts = serde_json::from_str(&text).unwrap();
    assert_eq!(cuts, decoded);

    let criteria = ReconstructabilityCriteria::default();
    let text = serde_json::to_string(&criteria).unwrap();
    let decoded: ReconstructabilityCriteria = serde_json::from_str(&text).unwrap();
    assert_eq!(criteria, decoded);
}

use rand::Rng;
use screen_sieve_common::config::SelectionPolicy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::hash::{DHash, HashError};

/// Per-image hash computed for one deduplication cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct HashRecord {
    pub image_id: PathBuf,
    /// Session-relative timestamp when the file name carries one.
    pub captured_at: Option<f64>,
    pub hash: DHash,
    pub width: u32,
    pub height: u32,
}

impl HashRecord {
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Near-duplicate images. `members[0]` is the seed every other member was
/// compared against.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    members: Vec<HashRecord>,
    representative: usize,
}

impl Group {
    pub fn seed(&self) -> &HashRecord {
        &self.members[0]
    }

    pub fn members(&self) -> &[HashRecord] {
        &self.members
    }

    pub fn representative(&self) -> &HashRecord {
        &self.members[self.representative]
    }

    /// Every member except the representative.
    pub fn duplicates(&self) -> impl Iterator<Item = &HashRecord> + '_ {
        self.members
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.representative)
            .map(|(_, r)| r)
    }

    pub fn contains(&self, image_id: &Path) -> bool {
        self.members.iter().any(|m| m.image_id == image_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Summary statistics of one grouping pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeduplicationReport {
    pub total_images: usize,
    pub group_count: usize,
    pub duplicates_removed: usize,
    /// group size -> number of groups of that size
    pub group_size_histogram: BTreeMap<usize, usize>,
    /// Images that could not be decoded and were left out of grouping.
    pub unreadable_images: usize,
    pub largest_group_size: usize,
    pub average_group_size: f64,
}

impl DeduplicationReport {
    pub fn from_groups(groups: &[Group], unreadable_images: usize) -> Self {
        let total_images: usize = groups.iter().map(Group::len).sum();
        let mut group_size_histogram = BTreeMap::new();
        for group in groups {
            *group_size_histogram.entry(group.len()).or_insert(0) += 1;
        }
        let average_group_size = if groups.is_empty() {
            0.0
        } else {
            total_images as f64 / groups.len() as f64
        };
        Self {
            total_images,
            group_count: groups.len(),
            // One representative per group.
            duplicates_removed: total_images - groups.len(),
            group_size_histogram,
            unreadable_images,
            largest_group_size: groups.iter().map(Group::len).max().unwrap_or(0),
            average_group_size,
        }
    }
}

/// Single-pass greedy clustering in input order.
///
/// An unassigned record opens a group and pulls in every later unassigned
/// record within `threshold` of it. Distances are measured against the seed
/// only, not against other members, so the result depends on input order.
pub fn cluster(records: Vec<HashRecord>, threshold: u32) -> Result<Vec<Vec<HashRecord>>, HashError> {
    let n = records.len();
    let mut assigned = vec![false; n];
    let mut index_groups: Vec<Vec<usize>> = Vec::new();

    for i in 0..n {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut members = vec![i];
        for j in (i + 1)..n {
            if assigned[j] {
                continue;
            }
            if records[i].hash.distance(&records[j].hash)? <= threshold {
                assigned[j] = true;
                members.push(j);
            }
        }
        index_groups.push(members);
    }

    let mut slots: Vec<Option<HashRecord>> = records.into_iter().map(Some).collect();
    Ok(index_groups
        .into_iter()
        .map(|members| members.into_iter().filter_map(|i| slots[i].take()).collect())
        .collect())
}

/// Index of the representative within `members`. `members` must be non-empty.
pub fn select_representative<R: Rng + ?Sized>(
    members: &[HashRecord],
    policy: SelectionPolicy,
    rng: &mut R,
) -> usize {
    match policy {
        SelectionPolicy::First => 0,
        SelectionPolicy::Random => rng.gen_range(0..members.len()),
        SelectionPolicy::HighestRes => {
            let mut best = 0;
            for (i, member) in members.iter().enumerate().skip(1) {
                // Strictly greater keeps the earliest member on ties.
                if member.pixel_count() > members[best].pixel_count() {
                    best = i;
                }
            }
            best
        }
    }
}

/// Cluster `records` and pick one representative per group.
pub fn group_and_select<R: Rng + ?Sized>(
    records: Vec<HashRecord>,
    threshold: u32,
    policy: SelectionPolicy,
    rng: &mut R,
) -> Result<Vec<Group>, HashError> {
    Ok(cluster(records, threshold)?
        .into_iter()
        .filter(|members| !members.is_empty())
        .map(|members| {
            let representative = select_representative(&members, policy, rng);
            Group {
                members,
                representative,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bits_with_flips(base: &[bool], flips: &[usize]) -> DHash {
        let mut bits = base.to_vec();
        for &i in flips {
            bits[i] = !bits[i];
        }
        DHash::from_bits(bits)
    }

    fn record(name: &str, hash: DHash, width: u32, height: u32) -> HashRecord {
        HashRecord {
            image_id: PathBuf::from(name),
            captured_at: None,
            hash,
            width,
            height,
        }
    }

    fn zeros() -> Vec<bool> {
        vec![false; 64]
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn identical_images_collapse_to_one_group() {
        let records: Vec<HashRecord> = (0..5)
            .map(|i| record(&format!("img{i}"), DHash::from_bits(zeros()), 10, 10))
            .collect();
        let groups = group_and_select(records, 10, SelectionPolicy::First, &mut rng()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 5);

        let report = DeduplicationReport::from_groups(&groups, 0);
        assert_eq!(report.total_images, 5);
        assert_eq!(report.duplicates_removed, 4);
        assert_eq!(report.group_size_histogram, BTreeMap::from([(5, 1)]));
    }

    #[test]
    fn distant_images_stay_singletons() {
        // Disjoint 16-bit blocks: every pair differs in 32 bits.
        let records: Vec<HashRecord> = (0..4)
            .map(|i| {
                let flips: Vec<usize> = (i * 16..(i + 1) * 16).collect();
                record(&format!("img{i}"), bits_with_flips(&zeros(), &flips), 10, 10)
            })
            .collect();
        let groups = group_and_select(records, 10, SelectionPolicy::First, &mut rng()).unwrap();
        assert_eq!(groups.len(), 4);
        assert!(groups.iter().all(|g| g.len() == 1));
        assert_eq!(DeduplicationReport::from_groups(&groups, 0).duplicates_removed, 0);
    }

    #[test]
    fn grouping_is_idempotent() {
        let records = vec![
            record("a", bits_with_flips(&zeros(), &[0, 1, 2]), 10, 10),
            record("b", bits_with_flips(&zeros(), &[1, 2]), 10, 10),
            record("c", bits_with_flips(&zeros(), &(20..44).collect::<Vec<_>>()), 10, 10),
            record("d", bits_with_flips(&zeros(), &(40..64).collect::<Vec<_>>()), 10, 10),
        ];
        let first = group_and_select(records, 10, SelectionPolicy::First, &mut rng()).unwrap();
        let reps: Vec<HashRecord> = first.iter().map(|g| g.representative().clone()).collect();
        let n = reps.len();

        let second = group_and_select(reps, 10, SelectionPolicy::First, &mut rng()).unwrap();
        assert_eq!(second.len(), n);
        assert!(second.iter().all(|g| g.len() == 1));
        assert_eq!(DeduplicationReport::from_groups(&second, 0).duplicates_removed, 0);
    }

    #[test]
    fn distance_is_measured_against_seed_only() {
        // b is 6 from a, c is 6 from b but 12 from a: c must not join a's group.
        let a = record("a", DHash::from_bits(zeros()), 1, 1);
        let b = record("b", bits_with_flips(&zeros(), &[0, 1, 2, 3, 4, 5]), 1, 1);
        let c = record(
            "c",
            bits_with_flips(&zeros(), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]),
            1,
            1,
        );
        let groups = group_and_select(vec![a, b, c], 10, SelectionPolicy::First, &mut rng()).unwrap();
        let sizes: Vec<usize> = groups.iter().map(Group::len).collect();
        assert_eq!(sizes, vec![2, 1]);
        assert_eq!(groups[0].seed().image_id, PathBuf::from("a"));
        assert!(groups[0].contains(Path::new("b")));
        assert_eq!(groups[1].seed().image_id, PathBuf::from("c"));
    }

    #[test]
    fn threshold_is_inclusive() {
        let a = record("a", DHash::from_bits(zeros()), 1, 1);
        let b = record("b", bits_with_flips(&zeros(), &(0..10).collect::<Vec<_>>()), 1, 1);
        let groups = group_and_select(vec![a, b], 10, SelectionPolicy::First, &mut rng()).unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn highest_res_picks_largest_pixel_count() {
        let members = vec![
            record("a", DHash::from_bits(zeros()), 10, 10),
            record("b", DHash::from_bits(zeros()), 20, 20),
            record("c", DHash::from_bits(zeros()), 25, 10),
        ];
        let idx = select_representative(&members, SelectionPolicy::HighestRes, &mut rng());
        assert_eq!(members[idx].pixel_count(), 400);
    }

    #[test]
    fn highest_res_ties_go_to_earliest() {
        let members = vec![
            record("a", DHash::from_bits(zeros()), 10, 10),
            record("b", DHash::from_bits(zeros()), 20, 10),
            record("c", DHash::from_bits(zeros()), 10, 20),
        ];
        let idx = select_representative(&members, SelectionPolicy::HighestRes, &mut rng());
        assert_eq!(idx, 1);
    }

    #[test]
    fn random_representative_is_a_member() {
        let records: Vec<HashRecord> = (0..6)
            .map(|i| record(&format!("img{i}"), DHash::from_bits(zeros()), 10, 10))
            .collect();
        let mut rng = rng();
        for _ in 0..20 {
            let groups =
                group_and_select(records.clone(), 0, SelectionPolicy::Random, &mut rng).unwrap();
            assert_eq!(groups.len(), 1);
            let rep = groups[0].representative();
            assert!(groups[0].contains(&rep.image_id));
            assert_eq!(groups[0].duplicates().count(), 5);
        }
    }

    #[test]
    fn every_record_lands_in_exactly_one_group() {
        let records: Vec<HashRecord> = (0..12)
            .map(|i| {
                let flips: Vec<usize> = (0..(i * 5) % 64).collect();
                record(&format!("img{i}"), bits_with_flips(&zeros(), &flips), 10, 10)
            })
            .collect();
        let groups = group_and_select(records, 8, SelectionPolicy::First, &mut rng()).unwrap();
        let mut seen: Vec<PathBuf> = groups
            .iter()
            .flat_map(|g| g.members().iter().map(|m| m.image_id.clone()))
            .collect();
        assert_eq!(seen.len(), 12);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn near_and_distinct_scenario() {
        // Three near-identical (pairwise <= 5) and two distinct (> 20 from all).
        let near_a = record("n1", bits_with_flips(&zeros(), &[0, 1]), 10, 10);
        let near_b = record("n2", bits_with_flips(&zeros(), &[2, 3]), 10, 10);
        let near_c = record("n3", bits_with_flips(&zeros(), &[0]), 10, 10);
        let far_a = record("f1", bits_with_flips(&zeros(), &(20..44).collect::<Vec<_>>()), 10, 10);
        let far_b = record("f2", bits_with_flips(&zeros(), &(40..64).collect::<Vec<_>>()), 10, 10);

        let groups = group_and_select(
            vec![near_a, far_a, near_b, far_b, near_c],
            10,
            SelectionPolicy::HighestRes,
            &mut rng(),
        )
        .unwrap();
        let report = DeduplicationReport::from_groups(&groups, 0);
        assert_eq!(report.group_count, 3);
        assert_eq!(report.duplicates_removed, 2);
        assert_eq!(report.group_size_histogram, BTreeMap::from([(1, 2), (3, 1)]));
        assert_eq!(report.largest_group_size, 3);
    }

    #[test]
    fn empty_input_gives_empty_report() {
        let groups = group_and_select(Vec::new(), 10, SelectionPolicy::First, &mut rng()).unwrap();
        let report = DeduplicationReport::from_groups(&groups, 2);
        assert_eq!(report.total_images, 0);
        assert_eq!(report.group_count, 0);
        assert_eq!(report.unreadable_images, 2);
        assert_eq!(report.average_group_size, 0.0);
    }

    #[test]
    fn mismatched_lengths_are_an_error() {
        let a = record("a", DHash::from_bits(vec![false; 64]), 1, 1);
        let b = record("b", DHash::from_bits(vec![false; 16]), 1, 1);
        assert!(cluster(vec![a, b], 10).is_err());
    }
}

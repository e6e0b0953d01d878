use crate::stations::filter::StationFilter;
use crate::types::coordinate::Coordinate;
use crate::types::station::Station;
use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use rstar::RTree;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Slack on squared chord distance when deciding the search can stop, so that
/// floating-point noise never cuts off an exact great-circle tie.
const CHORD_EPSILON: f64 = 1e-12;

/// Spatial index over one catalog snapshot.
#[derive(Debug, Clone)]
pub struct StationLocator {
    rtree: RTree<Station>,
    latest_observation_end: Option<NaiveDate>,
}

// Helper struct for BinaryHeap ordering
struct StationCandidate<'a> {
    distance_km: OrderedFloat<f64>,
    chord_2: f64,
    station: &'a Station,
}
// Ordered by great-circle distance, then by station id for exact ties.
impl PartialEq for StationCandidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for StationCandidate<'_> {}
impl PartialOrd for StationCandidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for StationCandidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_km
            .cmp(&other.distance_km)
            .then_with(|| self.station.id.cmp(&other.station.id))
    }
}

impl StationLocator {
    pub fn new(stations: Vec<Station>) -> Self {
        let latest_observation_end = stations.iter().map(|s| s.observation_end).max();
        StationLocator {
            rtree: RTree::bulk_load(stations),
            latest_observation_end,
        }
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    /// The most recent `observation_end` of any station in the snapshot.
    pub fn latest_observation_end(&self) -> Option<NaiveDate> {
        self.latest_observation_end
    }

    /// The qualifying station closest to `coordinate` and its distance in km.
    /// Exact distance ties go to the lexicographically smallest id.
    pub fn nearest(
        &self,
        coordinate: Coordinate,
        filter: &StationFilter,
    ) -> Option<(&Station, f64)> {
        self.nearest_n(coordinate, filter, 1).into_iter().next()
    }

    /// Up to `n_results` qualifying stations, closest first.
    ///
    /// The R-tree holds unit-sphere points, so its nearest-neighbour iterator
    /// yields stations in great-circle order. Iteration stops once the next
    /// station is farther than the worst kept candidate.
    pub fn nearest_n(
        &self,
        coordinate: Coordinate,
        filter: &StationFilter,
        n_results: usize,
    ) -> Vec<(&Station, f64)> {
        if n_results == 0 {
            return vec![];
        }
        let query_point = coordinate.unit_vector();
        let mut heap: BinaryHeap<StationCandidate<'_>> = BinaryHeap::with_capacity(n_results + 1);

        for (station, chord_2) in self.rtree.nearest_neighbor_iter_with_distance_2(&query_point) {
            if heap.len() == n_results {
                if let Some(worst) = heap.peek() {
                    if chord_2 > worst.chord_2 + CHORD_EPSILON {
                        break;
                    }
                }
            }
            if !filter.accepts(station) {
                continue;
            }
            heap.push(StationCandidate {
                distance_km: OrderedFloat(coordinate.distance_km(&station.coordinate)),
                chord_2,
                station,
            });
            if heap.len() > n_results {
                heap.pop();
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|c| (c.station, c.distance_km.into_inner()))
            .collect()
    }
}

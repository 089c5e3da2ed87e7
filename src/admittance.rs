use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use crate::error::{Result, TopologyError};
use crate::network::{BusType, Topology};

/// 2x2 nodal admittance contribution of a two-terminal element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stamp {
    pub yff: Complex64,
    pub yft: Complex64,
    pub ytf: Complex64,
    pub ytt: Complex64,
}

/// Capability shared by every two-terminal network element.
pub trait Element {
    fn id(&self) -> &str;
    fn endpoints(&self) -> (&str, &str);
    fn in_service(&self) -> bool;
    /// Parameter plausibility; referential integrity is the store's job.
    fn validate(&self) -> Result<()>;
    fn stamp(&self) -> Stamp;
    /// Complex power dissipated inside the element at the given terminal voltages.
    fn losses(&self, v_from: Complex64, v_to: Complex64) -> Complex64;
}

/// Connected components over in-service elements, as sorted bus positions.
///
/// Islands are ordered by their first bus, buses within an island by store order.
pub fn islands(topology: &Topology) -> Vec<Vec<usize>> {
    let n = topology.buses.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for element in topology.elements() {
        let (from, to) = element.endpoints();
        if let (Some(i), Some(j)) = (topology.bus_index(from), topology.bus_index(to)) {
            let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
            if ri != rj {
                parent[ri.max(rj)] = ri.min(rj);
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_of_root: Vec<Option<usize>> = vec![None; n];
    for bus in 0..n {
        let root = find(&mut parent, bus);
        match group_of_root[root] {
            Some(g) => groups[g].push(bus),
            None => {
                group_of_root[root] = Some(groups.len());
                groups.push(vec![bus]);
            }
        }
    }
    groups
}

/// Nodal admittance matrix and specified injections for one solvable set of buses.
#[derive(Debug, Clone)]
pub struct Admittance {
    pub bus_ids: Vec<String>,
    pub bus_types: Vec<BusType>,
    pub y: DMatrix<Complex64>,
    /// Specified constant-power injection per bus; meaningful at PQ (P and Q) and PV (P).
    pub injections: DVector<Complex64>,
    /// Constant-current injection per bus, scaled by `|V|` in the mismatch.
    pub currents: DVector<Complex64>,
    /// Slack voltage, PV magnitude at angle 0, flat 1.0 at PQ.
    pub setpoints: DVector<Complex64>,
}

impl Admittance {
    /// Assembles the whole network. Every island must be well formed.
    pub fn assemble(topology: &Topology) -> std::result::Result<Self, TopologyError> {
        if topology.buses.is_empty() {
            return Err(TopologyError::Empty);
        }
        for island in islands(topology) {
            check_island(topology, &island)?;
        }
        let all: Vec<usize> = (0..topology.buses.len()).collect();
        Ok(build(topology, &all))
    }

    /// Assembles each island on its own so healthy islands stay solvable.
    pub fn assemble_islands(topology: &Topology) -> Vec<std::result::Result<Self, TopologyError>> {
        islands(topology)
            .into_iter()
            .map(|island| {
                check_island(topology, &island)?;
                Ok(build(topology, &island))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bus_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bus_ids.is_empty()
    }
}

fn check_island(topology: &Topology, island: &[usize]) -> std::result::Result<(), TopologyError> {
    let names = || -> Vec<String> {
        island
            .iter()
            .map(|&i| topology.buses[i].id.clone())
            .collect()
    };

    if let [only] = island {
        let bus = &topology.buses[*only];
        warn!("bus {} has no in-service connection", bus.id);
        return Err(TopologyError::IsolatedBus(bus.id.clone()));
    }

    let slack_count = island
        .iter()
        .filter(|&&i| topology.buses[i].bus_type == BusType::Slack)
        .count();
    match slack_count {
        0 => {
            warn!("island {:?} has no slack bus", names());
            Err(TopologyError::NoSlack(names()))
        }
        1 => Ok(()),
        _ => Err(TopologyError::MultipleSlack(names())),
    }
}

fn build(topology: &Topology, buses: &[usize]) -> Admittance {
    let n = buses.len();
    // store position -> matrix index
    let mut local = vec![None; topology.buses.len()];
    for (k, &i) in buses.iter().enumerate() {
        local[i] = Some(k);
    }

    let mut y = DMatrix::<Complex64>::zeros(n, n);
    for element in topology.elements() {
        let (from, to) = element.endpoints();
        let (Some(f), Some(t)) = (
            topology.bus_index(from).and_then(|i| local[i]),
            topology.bus_index(to).and_then(|i| local[i]),
        ) else {
            continue;
        };
        let stamp = element.stamp();
        y[(f, f)] += stamp.yff;
        y[(f, t)] += stamp.yft;
        y[(t, f)] += stamp.ytf;
        y[(t, t)] += stamp.ytt;
    }

    for (k, &i) in buses.iter().enumerate() {
        y[(k, k)] += topology.buses[i].shunt;
    }

    let selected = || buses.iter().map(|&i| &topology.buses[i]);
    let admittance = Admittance {
        bus_ids: selected().map(|b| b.id.clone()).collect(),
        bus_types: selected().map(|b| b.bus_type).collect(),
        y,
        injections: DVector::from_iterator(n, selected().map(|b| b.injection)),
        currents: DVector::from_iterator(n, selected().map(|b| b.current)),
        setpoints: DVector::from_iterator(n, selected().map(|b| b.setpoint_voltage())),
    };
    debug!("Assembled {n}x{n} admittance matrix");
    admittance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Branch, Bus, Network};
    use crate::transformer::{Transformer, WindingConnection};

    fn z(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn line_stamp_is_symmetric_with_shunts_on_diagonal() {
        let mut net = Network::new("t", 100.0, 60.0);
        net.add_bus(Bus::new("A", BusType::Slack, 11.0)).unwrap();
        net.add_bus(Bus::new("B", BusType::PQ, 11.0).with_shunt(z(0.0, 0.02)))
            .unwrap();
        net.add_branch(Branch::new("L1", "A", "B", z(0.01, 0.05)).with_charging(z(0.0, 0.04)))
            .unwrap();

        let adm = Admittance::assemble(&net.topology()).unwrap();
        let y = 1.0 / z(0.01, 0.05);
        assert!((adm.y[(0, 1)] + y).norm() < 1e-12);
        assert!((adm.y[(0, 1)] - adm.y[(1, 0)]).norm() < 1e-12);
        assert!((adm.y[(0, 0)] - (y + z(0.0, 0.02))).norm() < 1e-12);
        assert!((adm.y[(1, 1)] - (y + z(0.0, 0.04))).norm() < 1e-12);
    }

    #[test]
    fn transformer_stamp_lands_on_its_endpoints() {
        let mut net = Network::new("t", 100.0, 60.0);
        net.add_bus(Bus::new("A", BusType::Slack, 33.0)).unwrap();
        net.add_bus(Bus::new("B", BusType::PQ, 11.0)).unwrap();
        let xfmr = Transformer::new("T1", "A", "B", WindingConnection::DeltaGroundedWye, z(0.0, 0.1));
        let stamp = xfmr.stamp();
        net.add_transformer(xfmr).unwrap();

        let adm = Admittance::assemble(&net.topology()).unwrap();
        assert_eq!(adm.y[(0, 1)], stamp.yft);
        assert_eq!(adm.y[(1, 0)], stamp.ytf);
    }

    #[test]
    fn out_of_service_branch_leaves_bus_isolated() {
        let mut net = Network::new("t", 100.0, 60.0);
        net.add_bus(Bus::new("A", BusType::Slack, 11.0)).unwrap();
        net.add_bus(Bus::new("B", BusType::PQ, 11.0)).unwrap();
        net.add_bus(Bus::new("C", BusType::PQ, 11.0)).unwrap();
        net.add_branch(Branch::new("L1", "A", "B", z(0.01, 0.05))).unwrap();
        let mut open = Branch::new("L2", "B", "C", z(0.01, 0.05));
        open.in_service = false;
        net.add_branch(open).unwrap();

        assert_eq!(
            Admittance::assemble(&net.topology()).unwrap_err(),
            TopologyError::IsolatedBus("C".to_string())
        );
    }

    #[test]
    fn islands_without_slack_are_reported_per_island() {
        let mut net = Network::new("t", 100.0, 60.0);
        for (id, ty) in [("A", BusType::Slack), ("B", BusType::PQ), ("C", BusType::PQ), ("D", BusType::PQ)] {
            net.add_bus(Bus::new(id, ty, 11.0)).unwrap();
        }
        net.add_branch(Branch::new("L1", "A", "B", z(0.01, 0.05))).unwrap();
        net.add_branch(Branch::new("L2", "C", "D", z(0.01, 0.05))).unwrap();

        let topology = net.topology();
        assert_eq!(islands(&topology), vec![vec![0, 1], vec![2, 3]]);
        assert!(matches!(
            Admittance::assemble(&topology),
            Err(TopologyError::NoSlack(_))
        ));

        let per_island = Admittance::assemble_islands(&topology);
        assert_eq!(per_island.len(), 2);
        let first = per_island[0].as_ref().unwrap();
        assert_eq!(first.bus_ids, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(
            per_island[1].as_ref().unwrap_err(),
            &TopologyError::NoSlack(vec!["C".to_string(), "D".to_string()])
        );
    }

    #[test]
    fn two_slacks_in_one_island_are_rejected() {
        let mut net = Network::new("t", 100.0, 60.0);
        net.add_bus(Bus::new("A", BusType::Slack, 11.0)).unwrap();
        net.add_bus(Bus::new("B", BusType::Slack, 11.0)).unwrap();
        net.add_branch(Branch::new("L1", "A", "B", z(0.01, 0.05))).unwrap();
        assert!(matches!(
            Admittance::assemble(&net.topology()),
            Err(TopologyError::MultipleSlack(_))
        ));
    }

    #[test]
    fn empty_network_is_rejected() {
        let net = Network::new("t", 100.0, 60.0);
        assert_eq!(
            Admittance::assemble(&net.topology()).unwrap_err(),
            TopologyError::Empty
        );
    }
}

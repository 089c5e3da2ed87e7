//! Lazy, time-driven scheduling of interdependent components.
//!
//! Every registered component carries a valid-until horizon. Advancing time
//! re-evaluates only the components whose horizon has been reached, in order of
//! horizon, and a component whose output changes pulls its dependents' horizons
//! back to the present so they are re-evaluated at the same instant.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::error::{Error, Result};

/// Simulated time in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime(pub i64);

impl SimTime {
    /// Before any real time; marks a component that must be evaluated.
    pub const NEG_INFINITY: SimTime = SimTime(i64::MIN);
    /// Never expires on its own.
    pub const INFINITY: SimTime = SimTime(i64::MAX);

    pub fn is_finite(&self) -> bool {
        *self != Self::NEG_INFINITY && *self != Self::INFINITY
    }

    /// Adds seconds, leaving the sentinels where they are.
    pub fn plus(self, seconds: i64) -> SimTime {
        if self.is_finite() {
            SimTime(self.0.saturating_add(seconds))
        } else {
            self
        }
    }

    pub fn seconds_since(self, earlier: SimTime) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SimTime::NEG_INFINITY => write!(f, "-inf"),
            SimTime::INFINITY => write!(f, "+inf"),
            SimTime(t) => write!(f, "{}s", t),
        }
    }
}

/// Output published by a component after an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Tick(i64),
    Scalar(f64),
    /// Complex power injection in per unit.
    Power(Complex64),
    /// Bus id and solved voltage, in bus order.
    Voltages(Vec<(String, Complex64)>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_power(&self) -> Option<Complex64> {
        match self {
            Value::Power(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_tick(&self) -> Option<i64> {
        match self {
            Value::Tick(n) => Some(*n),
            _ => None,
        }
    }

    pub fn voltage(&self, bus_id: &str) -> Option<Complex64> {
        match self {
            Value::Voltages(list) => list.iter().find(|(id, _)| id == bus_id).map(|(_, v)| *v),
            _ => None,
        }
    }
}

/// What a component reports back after being brought up to date.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub output: Value,
    /// Must lie strictly after the time of the update.
    pub valid_until: SimTime,
}

impl Update {
    pub fn new(output: Value, valid_until: SimTime) -> Self {
        Self {
            output,
            valid_until,
        }
    }
}

/// A component that can be scheduled by [`Simulation`].
pub trait SimComponent {
    /// Brings the component up to `ctx.time()`.
    fn update(&mut self, ctx: &UpdateContext<'_>) -> Result<Update>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub usize);

#[derive(Debug)]
struct Node {
    id: String,
    valid_until: SimTime,
    output: Option<Value>,
    dependencies: Vec<ComponentId>,
    dependents: Vec<ComponentId>,
    last_updated: Option<SimTime>,
}

/// Read access handed to a component while it updates.
pub struct UpdateContext<'a> {
    now: SimTime,
    id: &'a str,
    dependencies: &'a [ComponentId],
    nodes: &'a [Node],
}

impl<'a> UpdateContext<'a> {
    pub fn time(&self) -> SimTime {
        self.now
    }

    /// Id of the component being updated.
    pub fn id(&self) -> &str {
        self.id
    }

    /// Cached output of one of this component's dependencies.
    pub fn value_of(&self, dependency: &str) -> Result<&'a Value> {
        let nodes = self.nodes;
        let node = self
            .dependencies
            .iter()
            .map(|dep| &nodes[dep.0])
            .find(|node| node.id == dependency)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "component {} reads {} without depending on it",
                    self.id, dependency
                ))
            })?;
        node.output
            .as_ref()
            .ok_or_else(|| Error::NotEvaluated(node.id.clone()))
    }
}

/// The schedulable component graph.
pub struct Simulation {
    now: SimTime,
    components: Vec<Box<dyn SimComponent>>,
    nodes: Vec<Node>,
    index: HashMap<String, ComponentId>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("now", &self.now)
            .field("nodes", &self.nodes)
            .finish()
    }
}

impl Simulation {
    pub fn new(start: SimTime) -> Self {
        Self {
            now: start,
            components: Vec::new(),
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.start_time))
    }

    pub fn current_time(&self) -> SimTime {
        self.now
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn id_of(&self, id: &str) -> Option<ComponentId> {
        self.index.get(id).copied()
    }

    /// Adds a component that depends on already registered components.
    ///
    /// The new component starts expired, so the next evaluation pass updates it.
    pub fn register<C>(
        &mut self,
        id: impl Into<String>,
        component: C,
        dependencies: &[&str],
    ) -> Result<ComponentId>
    where
        C: SimComponent + 'static,
    {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(Error::Configuration(format!(
                "component {} is already registered",
                id
            )));
        }
        let mut deps: Vec<ComponentId> = Vec::with_capacity(dependencies.len());
        for name in dependencies {
            let dep = self.lookup(name)?;
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }

        let handle = ComponentId(self.nodes.len());
        for dep in &deps {
            self.nodes[dep.0].dependents.push(handle);
        }
        debug!("registering {} with {} dependencies", id, deps.len());
        self.index.insert(id.clone(), handle);
        self.nodes.push(Node {
            id,
            valid_until: SimTime::NEG_INFINITY,
            output: None,
            dependencies: deps,
            dependents: Vec::new(),
            last_updated: None,
        });
        self.components.push(Box::new(component));
        Ok(handle)
    }

    /// Makes `dependent` depend on `dependency`, refusing edges that close a cycle.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> Result<()> {
        let from = self.lookup(dependent)?;
        let to = self.lookup(dependency)?;
        if from == to {
            return Err(Error::Configuration(format!(
                "component {} cannot depend on itself",
                dependent
            )));
        }
        if self.nodes[from.0].dependencies.contains(&to) {
            return Ok(());
        }
        if self.depends_on(to, from) {
            return Err(Error::Configuration(format!(
                "dependency {} -> {} would create a cycle",
                dependent, dependency
            )));
        }

        self.nodes[from.0].dependencies.push(to);
        self.nodes[to.0].dependents.push(from);
        self.expire(from);
        Ok(())
    }

    /// Forces a component to be re-evaluated at the current instant.
    pub fn invalidate(&mut self, id: &str) -> Result<()> {
        let handle = self.lookup(id)?;
        self.expire(handle);
        Ok(())
    }

    /// Evaluates every component whose horizon has been reached, until none is left.
    ///
    /// Returns the number of updates performed. A failed update leaves its
    /// component pending.
    pub fn evaluate_pending(&mut self) -> Result<usize> {
        let mut count = 0;
        while let Some(next) = self.next_pending() {
            self.update_node(next)?;
            count += 1;
        }
        Ok(count)
    }

    /// Moves simulated time forward to `t`, stopping at every horizon on the way.
    pub fn advance_to(&mut self, t: SimTime) -> Result<()> {
        if !t.is_finite() {
            return Err(Error::Configuration(format!(
                "cannot advance to non-finite time {}",
                t
            )));
        }
        if t < self.now {
            return Err(Error::Configuration(format!(
                "cannot advance backwards from {} to {}",
                self.now, t
            )));
        }
        self.evaluate_pending()?;
        while let Some(horizon) = self.next_horizon().filter(|h| *h <= t) {
            self.now = horizon;
            self.evaluate_pending()?;
        }
        self.now = t;
        self.evaluate_pending()?;
        Ok(())
    }

    /// Steps to the next finite horizon. Returns `false` when nothing is scheduled.
    pub fn do_next_update(&mut self) -> Result<bool> {
        self.evaluate_pending()?;
        match self.next_horizon() {
            Some(horizon) => {
                self.now = horizon;
                self.evaluate_pending()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Earliest finite horizon after the current time.
    pub fn next_horizon(&self) -> Option<SimTime> {
        self.nodes
            .iter()
            .map(|node| node.valid_until)
            .filter(|t| t.is_finite() && *t > self.now)
            .min()
    }

    pub fn value_of(&self, id: &str) -> Result<&Value> {
        let handle = self.lookup(id)?;
        let node = &self.nodes[handle.0];
        node.output
            .as_ref()
            .ok_or_else(|| Error::NotEvaluated(node.id.clone()))
    }

    pub fn valid_until(&self, id: &str) -> Option<SimTime> {
        self.id_of(id).map(|handle| self.nodes[handle.0].valid_until)
    }

    pub fn last_updated(&self, id: &str) -> Option<SimTime> {
        self.id_of(id)
            .and_then(|handle| self.nodes[handle.0].last_updated)
    }

    /// Ids of components due at the current time, in evaluation order.
    pub fn pending(&self) -> Vec<&str> {
        let mut due: Vec<(SimTime, usize)> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.valid_until <= self.now)
            .map(|(i, node)| (node.valid_until, i))
            .collect();
        due.sort();
        due.into_iter()
            .map(|(_, i)| self.nodes[i].id.as_str())
            .collect()
    }

    pub fn component<T: 'static>(&self, id: &str) -> Option<&T> {
        let handle = self.id_of(id)?;
        self.components[handle.0].as_any().downcast_ref::<T>()
    }

    /// Mutable access; call [`Simulation::invalidate`] after changing state that
    /// affects the component's output.
    pub fn component_mut<T: 'static>(&mut self, id: &str) -> Option<&mut T> {
        let handle = self.id_of(id)?;
        self.components[handle.0].as_any_mut().downcast_mut::<T>()
    }

    fn lookup(&self, id: &str) -> Result<ComponentId> {
        self.id_of(id)
            .ok_or_else(|| Error::Configuration(format!("unknown component {}", id)))
    }

    fn expire(&mut self, handle: ComponentId) {
        let node = &mut self.nodes[handle.0];
        node.valid_until = node.valid_until.min(self.now);
    }

    // Does `from` reach `target` by following dependency edges?
    fn depends_on(&self, from: ComponentId, target: ComponentId) -> bool {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if std::mem::replace(&mut seen[current.0], true) {
                continue;
            }
            stack.extend(self.nodes[current.0].dependencies.iter().copied());
        }
        false
    }

    // Smallest horizon at or before now; registration order breaks ties.
    fn next_pending(&self) -> Option<ComponentId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.valid_until <= self.now)
            .min_by_key(|(i, node)| (node.valid_until, *i))
            .map(|(i, _)| ComponentId(i))
    }

    fn update_node(&mut self, handle: ComponentId) -> Result<()> {
        let node = &self.nodes[handle.0];
        let ctx = UpdateContext {
            now: self.now,
            id: &node.id,
            dependencies: &node.dependencies,
            nodes: &self.nodes,
        };
        let update = match self.components[handle.0].update(&ctx) {
            Ok(update) => update,
            Err(source) => {
                warn!("t={} {} failed to update: {}", self.now, node.id, source);
                return Err(Error::Component {
                    id: node.id.clone(),
                    source: Box::new(source),
                });
            }
        };
        if update.valid_until <= self.now {
            return Err(Error::Configuration(format!(
                "component {} returned horizon {} at time {}",
                node.id, update.valid_until, self.now
            )));
        }

        let node = &mut self.nodes[handle.0];
        let changed = node.output.as_ref() != Some(&update.output);
        debug!(
            "t={} updated {} (valid until {}, changed: {})",
            self.now, node.id, update.valid_until, changed
        );
        node.output = Some(update.output);
        node.valid_until = update.valid_until;
        node.last_updated = Some(self.now);

        if changed {
            for i in 0..self.nodes[handle.0].dependents.len() {
                let dependent = self.nodes[handle.0].dependents[i];
                self.expire(dependent);
            }
        }
        Ok(())
    }
}

// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Shader stage masks and the visibility they resolve to.
//!
//! Layout entries declare which shader stages can see them as a bitmask ([`Stages`]).
//! Native binding models are coarser than that: a root parameter is visible either to
//! exactly one graphics stage or to all of them.  [`Visibility::resolve`] performs that
//! reduction.
//!
//! ```
//! use roots_and_heaps::bindings::stages::{Stages, Visibility};
//!
//! assert_eq!(Visibility::resolve(Stages::FRAGMENT), Visibility::Fragment);
//! assert_eq!(Visibility::resolve(Stages::VERTEX | Stages::FRAGMENT), Visibility::All);
//! //compute has no finer granularity
//! assert_eq!(Visibility::resolve(Stages::COMPUTE), Visibility::All);
//! ```

bitflags::bitflags! {
    /// A set of shader stages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Stages: u32 {
        const VERTEX = 1 << 0;
        const HULL = 1 << 1;
        const DOMAIN = 1 << 2;
        const GEOMETRY = 1 << 3;
        const FRAGMENT = 1 << 4;
        const COMPUTE = 1 << 5;
        /// Any raytracing stage (raygen, miss, hit groups, callable).
        const RAYTRACING = 1 << 6;
    }
}

impl Stages {
    pub const NONE: Stages = Stages::empty();
    pub const ALL_GRAPHICS: Stages = Stages::VERTEX
        .union(Stages::HULL)
        .union(Stages::DOMAIN)
        .union(Stages::GEOMETRY)
        .union(Stages::FRAGMENT);
}

/// Shader visibility of a single native root parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    All,
    Vertex,
    Hull,
    Domain,
    Geometry,
    Fragment,
}

impl Visibility {
    /// Reduces a stage mask to a root parameter visibility.
    ///
    /// * exactly one graphics stage: that stage
    /// * compute or raytracing: [`Visibility::All`]
    /// * more than one stage, or none: [`Visibility::All`]
    pub fn resolve(stages: Stages) -> Visibility {
        const EXACT: [(Stages, Visibility); 5] = [
            (Stages::VERTEX, Visibility::Vertex),
            (Stages::HULL, Visibility::Hull),
            (Stages::DOMAIN, Visibility::Domain),
            (Stages::GEOMETRY, Visibility::Geometry),
            (Stages::FRAGMENT, Visibility::Fragment),
        ];
        EXACT
            .iter()
            .find(|(stage, _)| *stage == stages)
            .map_or(Visibility::All, |(_, visibility)| *visibility)
    }

    /// The stages a parameter with this visibility can be read from.
    pub fn stages(self) -> Stages {
        match self {
            Visibility::All => Stages::all(),
            Visibility::Vertex => Stages::VERTEX,
            Visibility::Hull => Stages::HULL,
            Visibility::Domain => Stages::DOMAIN,
            Visibility::Geometry => Stages::GEOMETRY,
            Visibility::Fragment => Stages::FRAGMENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_graphics_stage_is_exact() {
        assert_eq!(Visibility::resolve(Stages::VERTEX), Visibility::Vertex);
        assert_eq!(Visibility::resolve(Stages::HULL), Visibility::Hull);
        assert_eq!(Visibility::resolve(Stages::DOMAIN), Visibility::Domain);
        assert_eq!(Visibility::resolve(Stages::GEOMETRY), Visibility::Geometry);
        assert_eq!(Visibility::resolve(Stages::FRAGMENT), Visibility::Fragment);
    }

    #[test]
    fn compute_and_raytracing_degrade_to_all() {
        assert_eq!(Visibility::resolve(Stages::COMPUTE), Visibility::All);
        assert_eq!(Visibility::resolve(Stages::RAYTRACING), Visibility::All);
    }

    #[test]
    fn several_stages_degrade_to_all() {
        assert_eq!(
            Visibility::resolve(Stages::VERTEX | Stages::GEOMETRY),
            Visibility::All
        );
        assert_eq!(Visibility::resolve(Stages::NONE), Visibility::All);
    }

    #[test]
    fn all_graphics_excludes_compute() {
        assert!(Stages::ALL_GRAPHICS.contains(Stages::GEOMETRY));
        assert!(!Stages::ALL_GRAPHICS.intersects(Stages::COMPUTE | Stages::RAYTRACING));
        assert_eq!(Visibility::All.stages(), Stages::all());
    }

    #[test]
    fn debug_lists_names() {
        let s = format!("{:?}", Stages::VERTEX | Stages::FRAGMENT);
        assert_eq!(s, "Stages(VERTEX | FRAGMENT)");
    }
}

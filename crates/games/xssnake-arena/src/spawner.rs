use rand::RngCore;
use xssnake_core::grid::Coord;
use xssnake_core::level::Level;
use xssnake_core::net::messages::SpawnKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spawn {
    pub kind: SpawnKind,
    pub at: Coord,
}

/// Apples and powerups on the board. Ids are indices into `spawns`; a
/// consumed spawn leaves `None` behind so ids stay stable for the round.
#[derive(Debug, Default)]
pub struct Spawner {
    spawns: Vec<Option<Spawn>>,
}

impl Spawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a spawn of `kind` on a free cell and returns its id.
    pub fn spawn(
        &mut self,
        kind: SpawnKind,
        level: &dyn Level,
        occupied: &[Coord],
        rng: &mut dyn RngCore,
    ) -> Option<(usize, Spawn)> {
        let mut blocked: Vec<Coord> = self.locations().collect();
        blocked.extend_from_slice(occupied);
        let at = level.empty_location(&blocked, rng)?;
        let spawn = Spawn { kind, at };
        self.spawns.push(Some(spawn));
        Some((self.spawns.len() - 1, spawn))
    }

    /// Removes and returns every spawn at `head`.
    pub fn handle_hits(&mut self, head: Coord) -> Vec<(usize, Spawn)> {
        let mut hits = Vec::new();
        for (id, slot) in self.spawns.iter_mut().enumerate() {
            if slot.is_some_and(|s| s.at == head)
                && let Some(spawn) = slot.take()
            {
                hits.push((id, spawn));
            }
        }
        hits
    }

    pub fn num_of_type(&self, kind: SpawnKind) -> usize {
        self.spawns
            .iter()
            .flatten()
            .filter(|s| s.kind == kind)
            .count()
    }

    pub fn spawns(&self) -> &[Option<Spawn>] {
        &self.spawns
    }

    pub fn locations(&self) -> impl Iterator<Item = Coord> + '_ {
        self.spawns.iter().flatten().map(|s| s.at)
    }
}

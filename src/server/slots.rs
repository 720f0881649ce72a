// Connection slot table
// Fixed-capacity registry of in-flight connections, owned by the loop thread

/// Position of a slot in the table
pub type SlotIndex = usize;

/// A slot holds exactly one connection or nothing.
#[derive(Debug)]
pub enum Slot<T> {
    Empty,
    Occupied(T),
}

impl<T> Slot<T> {
    pub const fn is_occupied(&self) -> bool {
        matches!(self, Self::Occupied(_))
    }
}

/// Admission refused because the table is full.
///
/// Hands the offered connection back so the caller can drop it right away.
#[derive(Debug)]
pub struct Rejected<T>(pub T);

/// Fixed-capacity slot table.
///
/// Admission scans for the lowest free index. The capacity only gates
/// admissions: lowering it never evicts an occupied slot, the table just
/// refuses new connections until the live count drops below the cap.
#[derive(Debug)]
pub struct SlotTable<T> {
    slots: Vec<Slot<T>>,
    capacity: usize,
    occupied: usize,
}

impl<T> SlotTable<T> {
    pub fn new(capacity: usize) -> Self {
        let mut table = Self {
            slots: Vec::new(),
            capacity: 0,
            occupied: 0,
        };
        table.set_capacity(capacity);
        table
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots, which may exceed capacity after a shrink
    pub const fn occupied(&self) -> usize {
        self.occupied
    }

    pub const fn is_full(&self) -> bool {
        self.occupied >= self.capacity
    }

    /// Change the admission cap for future admissions
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        if self.slots.len() < capacity {
            self.slots.resize_with(capacity, || Slot::Empty);
        } else {
            self.trim_tail();
        }
    }

    /// Occupy the first empty slot, or hand the connection back
    pub fn try_admit(&mut self, conn: T) -> Result<SlotIndex, Rejected<T>> {
        if self.is_full() {
            return Err(Rejected(conn));
        }

        // Fewer than `capacity` live slots means one of the first `capacity` is free
        match self.slots[..self.capacity]
            .iter()
            .position(|slot| !slot.is_occupied())
        {
            Some(index) => {
                self.slots[index] = Slot::Occupied(conn);
                self.occupied += 1;
                Ok(index)
            }
            None => Err(Rejected(conn)),
        }
    }

    /// Empty a slot and return its connection; dropping it closes the socket.
    ///
    /// Releasing an empty or out-of-range slot does nothing.
    pub fn release(&mut self, index: SlotIndex) -> Option<T> {
        let slot = self.slots.get_mut(index)?;
        match std::mem::replace(slot, Slot::Empty) {
            Slot::Occupied(conn) => {
                self.occupied -= 1;
                if index >= self.capacity {
                    self.trim_tail();
                }
                Some(conn)
            }
            Slot::Empty => None,
        }
    }

    pub fn get_mut(&mut self, index: SlotIndex) -> Option<&mut T> {
        match self.slots.get_mut(index)? {
            Slot::Occupied(conn) => Some(conn),
            Slot::Empty => None,
        }
    }

    /// Occupied slot indices in ascending order
    pub fn occupied_indices(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_occupied())
            .map(|(index, _)| index)
    }

    /// Drop empty slots beyond the capacity left over from a shrink
    fn trim_tail(&mut self) {
        while self.slots.len() > self.capacity
            && matches!(self.slots.last(), Some(Slot::Empty))
        {
            self.slots.pop();
        }
    }
}

use lattice_shared::{DataIStream, DataOStream, Distributable, SerdeErr};

/// A single value, sent whole on every commit
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Counter {
    value: u64,
    dirty: bool,
}

impl Counter {
    pub fn new(value: u64) -> Self {
        Self { value, dirty: false }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn set(&mut self, value: u64) {
        self.value = value;
        self.dirty = true;
    }

    pub fn add(&mut self, amount: u64) {
        self.set(self.value + amount);
    }
}

impl Distributable for Counter {
    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn get_instance_data(&self, writer: &mut DataOStream) {
        writer.write(&self.value);
    }

    fn apply_instance_data(&mut self, reader: &mut DataIStream) -> Result<(), SerdeErr> {
        self.value = reader.read()?;
        Ok(())
    }
}

//! Small array-backed helper containers used by the allocator engine. No
//! heap allocation: every container is a fixed-capacity array sized by a
//! const generic.

pub(crate) mod index_set;

//! Label set to allocatable inventory, end to end.

pub mod gip;

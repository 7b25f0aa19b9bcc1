// CrashGuard - Tasks
//
// One std::thread per task (FreeRTOS tasks on the device), wired together
// with mpsc channels by the lifecycle manager.

pub mod alarm;
pub mod detector;
pub mod sensor;

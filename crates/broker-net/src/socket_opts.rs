use std::io;
use std::os::fd::AsRawFd;

/// Applies `SO_REUSEADDR`, `TCP_NODELAY`, and `TCP_CORK` to a TCP
/// socket (§6.5). `TCP_CORK` has no `std`/`mio` accessor, so it goes
/// through a raw `setsockopt` the same way the connection-buffer
/// sizing helper in this workspace's TCP stream already does.
pub(crate) fn set_tcp_options(fd: &impl AsRawFd) -> io::Result<()> {
    let fd = fd.as_raw_fd();
    unsafe {
        setsockopt_bool(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, true)?;
        setsockopt_bool(fd, libc::IPPROTO_TCP, libc::TCP_NODELAY, true)?;
        setsockopt_bool(fd, libc::IPPROTO_TCP, libc::TCP_CORK, true)?;
    }
    Ok(())
}

unsafe fn setsockopt_bool(
    fd: libc::c_int,
    level: libc::c_int,
    name: libc::c_int,
    value: bool,
) -> io::Result<()> {
    let value: libc::c_int = libc::c_int::from(value);
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            std::ptr::from_ref(&value).cast::<libc::c_void>(),
            core::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
}

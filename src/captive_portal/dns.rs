//! Captive portal 用的 DNS 劫持
//!
//! 所有查询都应答成 AP 自己的地址，让客户端的连通性检测落到配置页上。

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub const DNS_PORT: u16 = 53;
const DNS_RESPONSE_TTL: u32 = 60;
const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    /// 问题段长度（名字 + qtype + qclass）
    len: usize,
    pub qtype: u16,
    pub name: String,
}

pub fn parse_question(packet: &[u8]) -> Option<DnsQuestion> {
    if packet.len() < HEADER_LEN {
        return None;
    }

    let mut idx = HEADER_LEN;
    let mut name = String::new();

    loop {
        let label_len = *packet.get(idx)? as usize;
        idx += 1;
        if label_len == 0 {
            break;
        }
        // 查询里不该出现压缩指针
        if label_len & 0xC0 != 0 || idx + label_len > packet.len() {
            return None;
        }
        let label = std::str::from_utf8(&packet[idx..idx + label_len]).ok()?;
        if !name.is_empty() {
            name.push('.');
        }
        name.push_str(label);
        idx += label_len;
    }

    if idx + 4 > packet.len() {
        return None;
    }
    let qtype = u16::from_be_bytes([packet[idx], packet[idx + 1]]);
    idx += 4;

    Some(DnsQuestion {
        len: idx - HEADER_LEN,
        qtype,
        name,
    })
}

/// 构造只含一条 A 记录的应答，返回写入长度
pub fn build_response(
    query: &[u8],
    question: &DnsQuestion,
    answer: Ipv4Addr,
    response: &mut [u8],
) -> Option<usize> {
    let question_end = HEADER_LEN + question.len;
    let total = question_end + 16;
    if query.len() < question_end || response.len() < total {
        return None;
    }

    response[..total].fill(0);
    response[0..2].copy_from_slice(&query[0..2]);
    response[2] = 0x81; // standard response + recursion desired
    response[3] = 0x80; // recursion available
    response[4..6].copy_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    response[6..8].copy_from_slice(&1u16.to_be_bytes()); // ANCOUNT
    response[HEADER_LEN..question_end].copy_from_slice(&query[HEADER_LEN..question_end]);

    let answer_rr = &mut response[question_end..total];
    answer_rr[0] = 0xC0;
    answer_rr[1] = 0x0C; // pointer to question name
    answer_rr[2..4].copy_from_slice(&1u16.to_be_bytes()); // A
    answer_rr[4..6].copy_from_slice(&1u16.to_be_bytes()); // IN
    answer_rr[6..10].copy_from_slice(&DNS_RESPONSE_TTL.to_be_bytes());
    answer_rr[10..12].copy_from_slice(&4u16.to_be_bytes());
    answer_rr[12..16].copy_from_slice(&answer.octets());

    Some(total)
}

/// 后台线程里运行的 DNS 应答服务，`stop` 或 drop 时退出
pub struct DnsRedirect {
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
    worker: Option<JoinHandle<()>>,
}

impl DnsRedirect {
    pub fn start(bind: SocketAddr, answer: Ipv4Addr) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(bind)?;
        socket.set_read_timeout(Some(Duration::from_millis(200)))?;
        let local_addr = socket.local_addr()?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let worker = std::thread::Builder::new()
            .name("dns_redirect".to_string())
            .stack_size(6144)
            .spawn(move || serve(socket, answer, flag))?;

        log::info!("DNS server on {} responding with {}", local_addr, answer);
        Ok(Self {
            running,
            local_addr,
            worker: Some(worker),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("DNS server thread panicked");
            }
            log::info!("DNS server stopped");
        }
    }
}

impl Drop for DnsRedirect {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(socket: UdpSocket, answer: Ipv4Addr, running: Arc<AtomicBool>) {
    let mut frame = [0u8; 512];
    let mut response = [0u8; 512];

    while running.load(Ordering::Relaxed) {
        let (len, remote) = match socket.recv_from(&mut frame) {
            Ok(r) => r,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                continue
            }
            Err(e) => {
                log::warn!("DNS recv error: {:?}", e);
                continue;
            }
        };

        let query = &frame[..len];
        let Some(question) = parse_question(query) else {
            log::debug!("ignoring malformed DNS query");
            continue;
        };
        let Some(resp_len) = build_response(query, &question, answer, &mut response) else {
            log::debug!("failed to build DNS response");
            continue;
        };

        if let Err(e) = socket.send_to(&response[..resp_len], remote) {
            log::warn!("DNS send error: {:?}", e);
            continue;
        }
        log::debug!("DNS {} -> {} (qtype {})", question.name, answer, question.qtype);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // id 0x1234, RD, one question: connectivitycheck.gstatic.com A IN
    fn query() -> Vec<u8> {
        let mut q = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
        for label in ["connectivitycheck", "gstatic", "com"] {
            q.push(label.len() as u8);
            q.extend_from_slice(label.as_bytes());
        }
        q.extend_from_slice(&[0, 0x00, 0x01, 0x00, 0x01]);
        q
    }

    #[test]
    fn test_parse_question() {
        let question = parse_question(&query()).unwrap();
        assert_eq!(question.name, "connectivitycheck.gstatic.com");
        assert_eq!(question.qtype, 1);

        assert!(parse_question(&query()[..20]).is_none());
        assert!(parse_question(&[0; 5]).is_none());
    }

    #[test]
    fn test_build_response() {
        let q = query();
        let question = parse_question(&q).unwrap();
        let mut buf = [0u8; 512];
        let len = build_response(&q, &question, Ipv4Addr::new(192, 168, 4, 1), &mut buf).unwrap();

        assert_eq!(len, q.len() + 16);
        assert_eq!(&buf[0..2], &[0x12, 0x34]);
        assert_eq!(&buf[6..8], &[0, 1]);
        assert_eq!(&buf[12..q.len()], &q[12..]);
        assert_eq!(&buf[len - 4..len], &[192, 168, 4, 1]);

        let mut small = [0u8; 16];
        assert!(build_response(&q, &question, Ipv4Addr::LOCALHOST, &mut small).is_none());
    }

    #[test]
    fn test_redirect_answers_over_udp() {
        let answer = Ipv4Addr::new(10, 0, 0, 1);
        let mut dns = DnsRedirect::start("127.0.0.1:0".parse().unwrap(), answer).unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client.send_to(&query(), dns.local_addr()).unwrap();

        let mut buf = [0u8; 512];
        let (len, _) = client.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[len - 4..len], &answer.octets());

        dns.stop();
    }
}

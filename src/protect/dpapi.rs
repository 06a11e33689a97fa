//! DPAPI 바인딩
//!
//! 입력 blob은 호출자 버퍼를 빌려서(`InputBlob<'a>`) 호출이 끝날 때까지
//! 유효함을 수명으로 보장하고, 출력 blob은 OS가 할당한 메모리를
//! `LocalBlob`이 소유하여 `Drop`에서 정확히 한 번 해제합니다.

use std::marker::PhantomData;
use std::ptr;

use windows_sys::Win32::Foundation::{GetLastError, LocalFree};
use windows_sys::Win32::Security::Cryptography::{
    CryptProtectData, CryptUnprotectData, CRYPTPROTECT_LOCAL_MACHINE, CRYPTPROTECT_UI_FORBIDDEN,
    CRYPT_INTEGER_BLOB,
};
use zeroize::Zeroize;

use super::{DataProtector, KeyProtectionError, ProtectionScope};

/// 호출자 소유 버퍼를 가리키는 blob. 'a 동안 버퍼가 살아 있어야 합니다.
struct InputBlob<'a> {
    raw: CRYPT_INTEGER_BLOB,
    _data: PhantomData<&'a [u8]>,
}

impl<'a> InputBlob<'a> {
    fn new(data: &'a [u8]) -> Result<Self, KeyProtectionError> {
        let len = u32::try_from(data.len()).map_err(|_| KeyProtectionError::InputTooLarge(data.len()))?;
        Ok(Self {
            raw: CRYPT_INTEGER_BLOB {
                cbData: len,
                // DPAPI는 입력을 쓰지 않지만 시그니처가 *mut를 요구
                pbData: data.as_ptr() as *mut u8,
            },
            _data: PhantomData,
        })
    }

    fn as_ptr(&self) -> *const CRYPT_INTEGER_BLOB {
        &self.raw
    }
}

/// OS(LocalAlloc)가 채운 출력 blob
struct LocalBlob {
    raw: CRYPT_INTEGER_BLOB,
}

impl LocalBlob {
    fn empty() -> Self {
        Self {
            raw: CRYPT_INTEGER_BLOB {
                cbData: 0,
                pbData: ptr::null_mut(),
            },
        }
    }

    fn as_mut_ptr(&mut self) -> *mut CRYPT_INTEGER_BLOB {
        &mut self.raw
    }

    fn to_vec(&self) -> Vec<u8> {
        if self.raw.pbData.is_null() || self.raw.cbData == 0 {
            return Vec::new();
        }
        // SAFETY: 호출 성공 시 pbData는 cbData 바이트의 유효한 LocalAlloc 영역이며
        // Drop 전까지 해제되지 않음
        unsafe { std::slice::from_raw_parts(self.raw.pbData, self.raw.cbData as usize) }.to_vec()
    }
}

impl Drop for LocalBlob {
    fn drop(&mut self) {
        if self.raw.pbData.is_null() {
            return;
        }
        // SAFETY: pbData는 DPAPI가 LocalAlloc으로 할당했고 여기서만 해제됨
        unsafe {
            std::slice::from_raw_parts_mut(self.raw.pbData, self.raw.cbData as usize).zeroize();
            LocalFree(self.raw.pbData as _);
        }
        self.raw.pbData = ptr::null_mut();
        self.raw.cbData = 0;
    }
}

fn flags(scope: ProtectionScope) -> u32 {
    match scope {
        ProtectionScope::CurrentUser => CRYPTPROTECT_UI_FORBIDDEN,
        ProtectionScope::LocalMachine => CRYPTPROTECT_UI_FORBIDDEN | CRYPTPROTECT_LOCAL_MACHINE,
    }
}

fn last_error(call: &'static str) -> KeyProtectionError {
    // SAFETY: 스레드 로컬 에러 코드 조회
    let code = unsafe { GetLastError() };
    KeyProtectionError::CallFailed { call, code }
}

/// Windows DPAPI
#[derive(Debug, Default, Clone, Copy)]
pub struct Dpapi;

impl DataProtector for Dpapi {
    fn protect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: ProtectionScope,
    ) -> Result<Vec<u8>, KeyProtectionError> {
        let input = InputBlob::new(data)?;
        let entropy = entropy.map(InputBlob::new).transpose()?;
        let mut output = LocalBlob::empty();

        // SAFETY: input/entropy는 이 스코프 동안 호출자 버퍼를 빌리고 있고,
        // output은 OS가 채우며 LocalBlob::drop이 해제함
        let ok = unsafe {
            CryptProtectData(
                input.as_ptr(),
                ptr::null(),
                entropy.as_ref().map_or(ptr::null(), InputBlob::as_ptr),
                ptr::null(),
                ptr::null(),
                flags(scope),
                output.as_mut_ptr(),
            )
        };
        if ok == 0 {
            return Err(last_error("CryptProtectData"));
        }

        Ok(output.to_vec())
    }

    fn unprotect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: ProtectionScope,
    ) -> Result<Vec<u8>, KeyProtectionError> {
        let input = InputBlob::new(data)?;
        let entropy = entropy.map(InputBlob::new).transpose()?;
        let mut output = LocalBlob::empty();

        // SAFETY: protect와 동일
        let ok = unsafe {
            CryptUnprotectData(
                input.as_ptr(),
                ptr::null_mut(),
                entropy.as_ref().map_or(ptr::null(), InputBlob::as_ptr),
                ptr::null(),
                ptr::null(),
                flags(scope),
                output.as_mut_ptr(),
            )
        };
        if ok == 0 {
            return Err(last_error("CryptUnprotectData"));
        }

        Ok(output.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protect_unprotect_roundtrip() {
        let dpapi = Dpapi;
        let blob = dpapi
            .protect(b"master-key", Some(b"entropy".as_slice()), ProtectionScope::CurrentUser)
            .unwrap();
        assert_ne!(blob.as_slice(), b"master-key");

        let plain = dpapi
            .unprotect(&blob, Some(b"entropy".as_slice()), ProtectionScope::CurrentUser)
            .unwrap();
        assert_eq!(plain, b"master-key");
    }

    #[test]
    fn test_wrong_entropy_fails() {
        let dpapi = Dpapi;
        let blob = dpapi
            .protect(b"master-key", Some(b"a".as_slice()), ProtectionScope::CurrentUser)
            .unwrap();
        let result = dpapi.unprotect(&blob, Some(b"b".as_slice()), ProtectionScope::CurrentUser);
        assert!(matches!(result, Err(KeyProtectionError::CallFailed { .. })));
    }

    #[test]
    fn test_garbage_input_fails() {
        let result = Dpapi.unprotect(b"not a dpapi blob", None, ProtectionScope::CurrentUser);
        assert!(result.is_err());
    }
}
